//! Values derived from the import parameters once the stage is open.

use usdio_core::scene::CacheFileId;
use usdio_core::usd::Stage;
use usdio_math::{z_up_conversion, Axis, Mat4};

use crate::params::ImportParams;

/// Per-import derived state shared read-only by every prim reader.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportSettings {
    /// Global scale, including `metersPerUnit` when unit conversion is on.
    pub scale: f32,
    pub do_convert_mat: bool,
    /// Applied to root transforms when `do_convert_mat` is set.
    pub conversion_mat: Mat4,
    /// Cache file that constraints and modifiers point back to.
    pub cache_file: Option<CacheFileId>,
    /// Time code every reader samples during the import pass.
    pub read_time: f64,
}

impl ImportSettings {
    pub fn new(params: &ImportParams) -> Self {
        Self {
            scale: params.scale,
            do_convert_mat: false,
            conversion_mat: Mat4::IDENTITY,
            cache_file: None,
            read_time: 0.0,
        }
    }

    /// Settings for reading `stage` with `params`.
    pub fn for_stage(params: &ImportParams, stage: &Stage) -> Self {
        let mut settings = Self::new(params);
        settings.apply_stage(params, stage);
        settings
    }

    pub fn apply_stage(&mut self, params: &ImportParams, stage: &Stage) {
        if params.convert_to_z_up && stage.up_axis() != Axis::Z {
            self.do_convert_mat = true;
            self.conversion_mat = z_up_conversion();
        }
        if params.apply_unit_conversion_scale {
            if let Some(mpu) = stage.meters_per_unit() {
                self.scale *= mpu as f32;
            }
        }
        self.read_time = stage.start_time_code().unwrap_or(0.0);
    }
}
