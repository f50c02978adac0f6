#![no_main]

use libfuzzer_sys::fuzz_target;
use zenimage::{Image, detect_format};

// Detection and decoding must never panic, and a successful decode must be
// self-consistent.
fuzz_target!(|data: &[u8]| {
    let detected = detect_format(data).ok();
    if let Ok(image) = Image::open_memory(data) {
        assert_eq!(Some(image.image_format()), detected);
        let pixels = image.pixels().expect("decoded image has pixels");
        assert_eq!(
            pixels.len(),
            image.width() as usize * image.height() as usize
        );
        assert_eq!(image.iter().count(), pixels.len());
    }
});
