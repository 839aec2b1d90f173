#![no_main]

use libfuzzer_sys::fuzz_target;
use pepatch::{patch::EmbeddedImage, PeImage};

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = PeImage::parse(data) {
        let _ = image.dependencies();
        let _ = image.serialize();
    }
    let _ = EmbeddedImage::parse(data);
});
