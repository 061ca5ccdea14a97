//! Conventional working-directory file names of the DAOPHOT suite and the
//! built-in option files.

use std::path::Path;

use crate::error::Result;
use crate::runner::Runner;

pub const DAOPHOT_OPT: &str = "daophot.opt";
pub const PHOTO_OPT: &str = "photo.opt";
pub const ALLSTAR_OPT: &str = "allstar.opt";

pub const IMAGE: &str = "i.fits";
pub const FOUND_STARS: &str = "i.coo";
pub const APERTURE_PHOTOMETRY: &str = "i.ap";
pub const PSF_STARS: &str = "i.lst";
pub const PSF: &str = "i.psf";
pub const PROFILE_PHOTOMETRY: &str = "i.als";
pub const GROUPS: &str = "i.grp";
pub const SUBTRACTED_IMAGE: &str = "i.sub.fits";

pub const DEFAULT_DAOPHOT_OPT: &str = include_str!("../../config/daophot.opt");
pub const DEFAULT_PHOTO_OPT: &str = include_str!("../../config/photo.opt");
pub const DEFAULT_ALLSTAR_OPT: &str = include_str!("../../config/allstar.opt");

/// Put an option file at `local`: the configured file if any, else the built-in text.
pub(crate) fn stage_opt_file(
    runner: &Runner,
    configured: Option<&Path>,
    local: &str,
    builtin: &str,
) -> Result<()> {
    match configured {
        Some(path) => runner.copy_in(path, Some(local)).map(|_| ()),
        None => runner.write_file(local, builtin),
    }
}
