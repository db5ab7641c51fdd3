//! Deriving the target file name from the user's template and the name of
//! the uploaded file.

mod pattern;
mod template;

pub(crate) use pattern::*;
pub(crate) use template::*;
