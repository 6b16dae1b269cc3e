mod error;
mod perusal;
#[cfg(test)]
mod testutil;
mod watermark;

pub use error::PdfError;
pub use perusal::derive_perusal;
pub use watermark::{
    LicenseStamp, PerusalStamp, Placement, Rgb, WatermarkOptions, license_watermark, page_count,
    perusal_watermark, watermark,
};
