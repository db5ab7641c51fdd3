use super::MediaConvError;
use crate::prelude::*;
use crate::{err_ctx, Result};
use fast_image_resize as fr;
use std::sync::OnceLock;

/// Decodes the image, stretches it to a `side x side` square and re-encodes
/// it as an RGB JPEG, which is the format Telegram expects for thumbnails.
pub(crate) async fn normalize_thumbnail(bytes: Vec<u8>, side: u32) -> Result<Vec<u8>> {
    crate::util::tokio::spawn_blocking(move || normalize_thumbnail_sync(&bytes, side))
        .with_duration_log("Normalize thumbnail")
        .await
}

pub(crate) fn normalize_thumbnail_sync(bytes: &[u8], side: u32) -> Result<Vec<u8>> {
    let src = image::load_from_memory(bytes).map_err(err_ctx!(MediaConvError::DecodeImage))?;

    // Alpha channel isn't supported by JPEG
    let src = src.into_rgb8();
    let (width, height) = src.dimensions();

    let mut src = fr::images::Image::from_vec_u8(width, height, src.into_raw(), fr::PixelType::U8x3)
        .fatal_ctx(|| "Failed to create source image pixels container")?;

    // Resizing must happen in linear colorspace
    srgb_mapper()
        .forward_map_inplace(&mut src)
        .fatal_ctx(|| "Failed to map the image from sRGB to linear colorspace")?;

    let mut dest = fr::images::Image::new(side, side, fr::PixelType::U8x3);

    let options = fr::ResizeOptions::new()
        // Lanczos3 is the best algorithm for downsampling
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));

    fr::Resizer::new()
        .resize(&src, &mut dest, &options)
        .fatal_ctx(|| "Failed to resize image")?;

    drop(src);

    srgb_mapper()
        .backward_map_inplace(&mut dest)
        .fatal_ctx(|| "Failed to map the image from linear to sRGB colorspace")?;

    let dest = image::RgbImage::from_raw(side, side, dest.buffer().to_vec())
        .fatal_ctx(|| "Resized image buffer has unexpected size")?;

    let mut output = Vec::new();

    image::DynamicImage::ImageRgb8(dest)
        .write_to(&mut std::io::Cursor::new(&mut output), image::ImageFormat::Jpeg)
        .map_err(err_ctx!(MediaConvError::EncodeImage))?;

    Ok(output)
}

fn srgb_mapper() -> &'static fr::PixelComponentMapper {
    static GLOBAL: OnceLock<fr::PixelComponentMapper> = OnceLock::new();
    GLOBAL.get_or_init(fr::create_srgb_mapper)
}
