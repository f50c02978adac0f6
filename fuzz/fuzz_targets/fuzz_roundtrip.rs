#![no_main]

use libfuzzer_sys::fuzz_target;
use zenimage::{EncoderOptions, Image};

// Whatever decodes must re-encode to its own format, decode to the same
// layout, and reach a fixed point after one cycle.
fuzz_target!(|data: &[u8]| {
    let Ok(image) = Image::open_memory(data) else {
        return;
    };
    let format = image.image_format();
    let Ok(first) = image.save_to_vec(format, &EncoderOptions::Default) else {
        return;
    };

    let decoded = Image::open_memory(&first).expect("own output decodes");
    assert_eq!(decoded.image_format(), format);
    assert_eq!(
        (decoded.width(), decoded.height()),
        (image.width(), image.height())
    );
    assert_eq!(decoded.pixel_format(), image.pixel_format());

    let second = decoded
        .save_to_vec(format, &EncoderOptions::Default)
        .expect("re-encode");
    assert_eq!(first, second);
});
