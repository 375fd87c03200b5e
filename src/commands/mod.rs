pub mod inspect;

pub use inspect::{inspect_firmware, ConfigurationSummary, FirmwareSummary, ImageSummary};
