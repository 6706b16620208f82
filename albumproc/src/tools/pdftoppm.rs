//! pdftoppm-backed page rasterizer

use super::process::run_with_timeout;
use super::{Rasterizer, ToolError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

const RENDER_DPI: u32 = 300;

/// Rasterizer invoking poppler's `pdftoppm`, one PNG per call
pub struct PdftoppmRasterizer {
    binary: PathBuf,
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf: &Path, page: usize, out_dir: &Path) -> Result<PathBuf, ToolError> {
        std::fs::create_dir_all(out_dir)?;

        // -singlefile writes exactly "<prefix>.png" with no page-number suffix
        let prefix = out_dir.join(format!("page-{:04}", page));
        let page_arg = page.to_string();
        let args: Vec<OsString> = vec![
            OsString::from("-f"),
            OsString::from(&page_arg),
            OsString::from("-l"),
            OsString::from(&page_arg),
            OsString::from("-r"),
            OsString::from(RENDER_DPI.to_string()),
            OsString::from("-png"),
            OsString::from("-singlefile"),
            pdf.as_os_str().to_owned(),
            prefix.as_os_str().to_owned(),
        ];
        run_with_timeout(&self.binary, &args, self.timeout)?;

        let image = prefix.with_extension("png");
        if !image.exists() {
            return Err(ToolError::Output(format!(
                "pdftoppm wrote no image for page {} of {}",
                page,
                pdf.display()
            )));
        }
        Ok(image)
    }
}
