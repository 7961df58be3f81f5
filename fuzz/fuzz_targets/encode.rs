#![no_main]
use anigif::{Config, Encoder, PixelFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let width = u16::from(data[0] % 32) + 1;
    let height = u16::from(data[1] % 32) + 1;
    let quality = data[2] % 30 + 1;
    let format = PixelFormat::try_from(data[3] % 4 + 1).unwrap();
    let config = Config::new(width, height)
        .with_quality(quality)
        .with_global_color_map(data[3] & 0x80 != 0);
    let mut enc = Encoder::with_memory(config);
    enc.begin_stream().unwrap();
    let frame_len = usize::from(width) * usize::from(height) * format.channels();
    for pixels in data[4..].chunks(frame_len) {
        // short trailing chunk must be rejected
        let res = enc.encode_frame(format, pixels, width, height, 1);
        assert_eq!(res.is_ok(), pixels.len() == frame_len);
    }
    enc.end_stream().unwrap();
});
