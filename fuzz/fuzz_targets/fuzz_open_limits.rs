#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zenimage::{DecodeRequest, Limits, Source};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    max_width: Option<u16>,
    max_height: Option<u16>,
    max_pixels: Option<u32>,
    data: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    let limits = Limits {
        max_width: input.max_width.map(u64::from),
        max_height: input.max_height.map(u64::from),
        max_pixels: input.max_pixels.map(u64::from),
        ..Limits::default()
    };
    if let Ok(image) = DecodeRequest::new(Source::Memory(input.data))
        .with_limits(&limits)
        .decode()
    {
        if let Some(w) = limits.max_width {
            assert!(u64::from(image.width()) <= w);
        }
        if let Some(h) = limits.max_height {
            assert!(u64::from(image.height()) <= h);
        }
        if let Some(p) = limits.max_pixels {
            assert!(u64::from(image.width()) * u64::from(image.height()) <= p);
        }
    }
});
