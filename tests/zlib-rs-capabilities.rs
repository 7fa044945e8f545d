//! Validate that certain lower-level `Compress`/`Decompress` entry points
//! are present and behave as documented.
use zedc::{Compress, Compression, Decompress, Flush, Status};

#[test]
fn compress_new_with_window_bits_is_present_and_works() {
    // 8..=15 selects the zlib wrapper, with the low bits giving the window size.
    let mut encoder = Compress::new_with_window_bits(Compression::default(), 9);
    let mut decoder = Decompress::new_with_window_bits(9);

    let mut compressed = vec![0; 1024];
    let status = encoder
        .compress(b"hello hello hello", &mut compressed, Flush::Finish)
        .unwrap();
    assert_eq!(status, Status::StreamEnd);
    let produced = encoder.total_out() as usize;

    let mut decompressed = vec![0; 1024];
    let status = decoder
        .decompress(&compressed[..produced], &mut decompressed, Flush::Finish)
        .unwrap();
    assert_eq!(status, Status::StreamEnd);
    assert_eq!(
        &decompressed[..decoder.total_out() as usize],
        b"hello hello hello"
    );
}

#[test]
fn decompress_new_with_window_bits_gzip_is_present_and_works() {
    // 16..=31 selects the gzip wrapper.
    let mut encoder = Compress::new_with_window_bits(Compression::default(), 16 + 9);
    let mut decoder = Decompress::new_with_window_bits(16 + 9);

    let mut compressed = vec![0; 1024];
    let status = encoder
        .compress(b"gzip me please", &mut compressed, Flush::Finish)
        .unwrap();
    assert_eq!(status, Status::StreamEnd);
    let produced = encoder.total_out() as usize;

    let mut decompressed = vec![0; 1024];
    let status = decoder
        .decompress(&compressed[..produced], &mut decompressed, Flush::Finish)
        .unwrap();
    assert_eq!(status, Status::StreamEnd);
    assert_eq!(
        &decompressed[..decoder.total_out() as usize],
        b"gzip me please"
    );
}

#[test]
#[should_panic(expected = "invalid window_bits")]
fn compress_new_with_window_bits_invalid_low() {
    Compress::new_with_window_bits(Compression::default(), -7);
}

#[test]
#[should_panic(expected = "invalid window_bits")]
fn compress_new_with_window_bits_invalid_high() {
    Compress::new_with_window_bits(Compression::default(), 32);
}

#[test]
#[should_panic(expected = "invalid window_bits")]
fn decompress_new_with_window_bits_invalid_low() {
    Decompress::new_with_window_bits(7);
}

#[test]
#[should_panic(expected = "invalid window_bits")]
fn decompress_new_with_window_bits_invalid_high() {
    Decompress::new_with_window_bits(32);
}

#[test]
fn set_dictionary_is_present() {
    let dictionary = "hello".as_bytes();

    let mut encoder = Compress::new(Compression::default(), false);
    encoder.set_dictionary(dictionary).unwrap();

    let mut decoder = Decompress::new(false);
    decoder.set_dictionary(dictionary).unwrap();
}
