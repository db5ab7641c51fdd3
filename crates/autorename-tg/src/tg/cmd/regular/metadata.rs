use super::CommandError;
use crate::prefs::{Metadata, MetadataField};
use crate::{err, Result};
use itertools::Itertools;
use strum::IntoEnumIterator;

/// Fields of `/setaudioinfo` in the order they are expected
const AUDIO_INFO_FIELDS: [MetadataField; 4] = [
    MetadataField::AudioArtist,
    MetadataField::AudioTitle,
    MetadataField::AudioGenre,
    MetadataField::AudioAlbum,
];

/// Parses `artist|title|genre|album`. A blank value unsets the field.
pub(super) fn parse_audio_info(input: &str) -> Result<Vec<(MetadataField, Option<String>)>> {
    let values: Vec<_> = input.split('|').map(str::trim).collect();

    if values.len() != AUDIO_INFO_FIELDS.len() {
        return Err(err!(CommandError::InvalidAudioInfo {
            actual: values.len(),
        }));
    }

    let fields = AUDIO_INFO_FIELDS
        .into_iter()
        .zip(values)
        .map(|(field, value)| (field, Some(value.to_owned()).filter(|value| !value.is_empty())))
        .collect();

    Ok(fields)
}

pub(super) fn describe(metadata: &Metadata) -> String {
    let width = MetadataField::iter()
        .map(|field| field.to_string().len())
        .max()
        .unwrap_or_default();

    MetadataField::iter()
        .map(|field| {
            let value = metadata.get(field).unwrap_or("-");
            format!("{:width$} : {value}", field.to_string())
        })
        .join("\n")
}
