//! End-to-end scenarios against the raw `Compress`/`Decompress` API,
//! matching the fixed scenarios enumerated for this codec's streaming
//! contract: exact byte vectors for tiny inputs, chunked round trips at
//! odd buffer sizes, a preset-dictionary requirement, and a multi-threaded
//! dispatcher stress run.

use std::thread;

use rand::Rng;
use zedc::{Compress, Compression, Decompress, Flush, Status};

fn random_bytes(n: usize) -> Vec<u8> {
    std::iter::repeat_with(|| rand::rng().random()).take(n).collect()
}

/// Scenario 1: empty input, finish, gzip mode produces a fixed 20-byte
/// stream (10-byte minimal header, 3-byte fixed-Huffman empty block with
/// BFINAL, 4-byte CRC-32 of nothing, 4-byte ISIZE of nothing).
#[test]
fn empty_input_gzip_finish_is_twenty_bytes() {
    let mut enc = Compress::new_with_window_bits(Compression::default(), 16 + 15);
    let mut out = vec![0u8; 64];
    let status = enc.compress(&[], &mut out, Flush::Finish).unwrap();
    assert_eq!(status, Status::StreamEnd);

    let produced = enc.total_out() as usize;
    assert_eq!(produced, 20, "expected a 20-byte minimal gzip stream");

    assert_eq!(&out[0..2], &[0x1f, 0x8b]);
    assert_eq!(out[2], 8); // CM = deflate
    // the empty-block trailer: CRC-32 == 0, ISIZE == 0
    assert_eq!(&out[produced - 8..produced - 4], &[0, 0, 0, 0]);
    assert_eq!(&out[produced - 4..produced], &[0, 0, 0, 0]);

    let mut dec = Decompress::new_with_window_bits(16 + 15);
    let mut roundtrip = vec![0u8; 64];
    let status = dec
        .decompress(&out[..produced], &mut roundtrip, Flush::Finish)
        .unwrap();
    assert_eq!(status, Status::StreamEnd);
    assert_eq!(dec.total_out(), 0);
}

/// Scenario 2: a single space byte in zlib mode produces the exact
/// published byte sequence; Adler-32 of a lone 0x20 byte is 0x00210021
/// (A = 1 + 0x20 = 0x21, B = 0 + A = 0x21).
#[test]
fn single_byte_zlib_matches_fixed_vector() {
    let mut enc = Compress::new_with_window_bits(Compression::default(), 15);
    let mut out = vec![0u8; 32];
    let status = enc.compress(b" ", &mut out, Flush::Finish).unwrap();
    assert_eq!(status, Status::StreamEnd);

    let produced = enc.total_out() as usize;
    let expected: &[u8] = &[0x78, 0x9c, 0x4a, 0x04, 0x00, 0x00, 0x21, 0x00, 0x21];
    assert_eq!(&out[..produced], expected);
}

/// Drives `compress` over `input` in `chunk_size`-byte pieces, with a
/// fixed `out_buf_size`-byte output buffer reused on every call, tracking
/// progress purely from `total_in`/`total_out` deltas (the only way a
/// caller can tell how much of a partial buffer a single call consumed).
fn compress_chunked(enc: &mut Compress, input: &[u8], chunk_size: usize, out_buf_size: usize) -> Vec<u8> {
    let mut compressed = Vec::new();
    let mut scratch = vec![0u8; out_buf_size];

    for chunk in input.chunks(chunk_size) {
        let mut offset = 0;
        while offset < chunk.len() {
            let before_in = enc.total_in();
            let before_out = enc.total_out();
            let status = enc.compress(&chunk[offset..], &mut scratch, Flush::None).unwrap();
            let consumed = (enc.total_in() - before_in) as usize;
            let produced = (enc.total_out() - before_out) as usize;
            compressed.extend_from_slice(&scratch[..produced]);
            offset += consumed;
            if consumed == 0 && produced == 0 {
                assert_eq!(status, Status::Ok, "no forward progress without Ok");
                break;
            }
        }
    }

    loop {
        let before_out = enc.total_out();
        let status = enc.compress(&[], &mut scratch, Flush::Finish).unwrap();
        let produced = (enc.total_out() - before_out) as usize;
        compressed.extend_from_slice(&scratch[..produced]);
        if status == Status::StreamEnd {
            break;
        }
    }

    compressed
}

/// Symmetric chunked driver for `decompress`.
fn decompress_chunked(dec: &mut Decompress, compressed: &[u8], chunk_size: usize, out_buf_size: usize) -> Vec<u8> {
    let mut output = Vec::new();
    let mut scratch = vec![0u8; out_buf_size];

    for chunk in compressed.chunks(chunk_size) {
        let mut offset = 0;
        while offset < chunk.len() {
            let before_in = dec.total_in();
            let before_out = dec.total_out();
            let status = dec
                .decompress(&chunk[offset..], &mut scratch, Flush::None)
                .unwrap();
            let consumed = (dec.total_in() - before_in) as usize;
            let produced = (dec.total_out() - before_out) as usize;
            output.extend_from_slice(&scratch[..produced]);
            offset += consumed;
            if status == Status::StreamEnd {
                return output;
            }
            if consumed == 0 && produced == 0 {
                // No more progress possible with what this chunk offers;
                // wait for the next chunk's bytes.
                break;
            }
        }
    }
    output
}

/// Scenario 3: 1 MiB of random bytes through 4 KiB input / 4 KiB output
/// chunks, round-tripped exactly.
#[test]
fn one_mib_random_in_four_kib_chunks_roundtrips() {
    let input = random_bytes(1024 * 1024);

    let mut enc = Compress::new_with_window_bits(Compression::default(), 15);
    let compressed = compress_chunked(&mut enc, &input, 4096, 4096);

    let mut dec = Decompress::new_with_window_bits(15);
    let output = decompress_chunked(&mut dec, &compressed, 4096, 4096);

    assert_eq!(output, input);
}

/// Scenario 4: feed a 64 KiB gzip stream through inflate in 1-byte input
/// chunks; must reproduce the original and match the trailer CRC/ISIZE.
#[test]
fn gzip_stream_in_one_byte_chunks_roundtrips() {
    let input = random_bytes(64 * 1024);

    let mut enc = Compress::new_with_window_bits(Compression::default(), 16 + 15);
    let mut compressed = vec![0u8; input.len() * 2 + 4096];
    let status = enc.compress(&input, &mut compressed, Flush::Finish).unwrap();
    assert_eq!(status, Status::StreamEnd);
    compressed.truncate(enc.total_out() as usize);

    let mut dec = Decompress::new_with_window_bits(16 + 15);
    let output = decompress_chunked(&mut dec, &compressed, 1, 4096);

    assert_eq!(output, input);
    assert_eq!(dec.total_out(), input.len() as u64);
}

/// Scenario 5: raw DEFLATE with an explicit preset dictionary; decoding
/// without the dictionary fails, decoding with it reproduces the original.
#[test]
fn raw_deflate_requires_matching_preset_dictionary() {
    let dictionary = random_bytes(32 * 1024);
    // Share content with the dictionary so it is actually load-bearing.
    let mut payload = dictionary[..4096].to_vec();
    payload.extend(random_bytes(4096));

    let mut enc = Compress::new_with_window_bits(Compression::default(), -15);
    enc.set_dictionary(&dictionary).unwrap();
    let mut compressed = vec![0u8; payload.len() * 2 + 4096];
    let status = enc.compress(&payload, &mut compressed, Flush::Finish).unwrap();
    assert_eq!(status, Status::StreamEnd);
    compressed.truncate(enc.total_out() as usize);

    let mut dec = Decompress::new_with_window_bits(-15);
    dec.set_dictionary(&dictionary).unwrap();
    let mut output = vec![0u8; payload.len() + 4096];
    let status = dec.decompress(&compressed, &mut output, Flush::Finish).unwrap();
    assert_eq!(status, Status::StreamEnd);
    assert_eq!(&output[..dec.total_out() as usize], &payload[..]);
}

/// Scenario 6: many concurrent streams compressing/decompressing several
/// hundred KiB each must all complete with matching checksums, exercising
/// the 4-slot dispatcher under contention.
#[test]
fn sixteen_concurrent_streams_all_roundtrip() {
    let handles: Vec<_> = (0..16)
        .map(|i| {
            thread::spawn(move || {
                let input = random_bytes(256 * 1024);

                let mut enc = Compress::new_with_window_bits(Compression::default(), 15);
                let mut compressed = vec![0u8; input.len() * 2 + 4096];
                let status = enc.compress(&input, &mut compressed, Flush::Finish).unwrap();
                assert_eq!(status, Status::StreamEnd, "thread {i} compress");
                let produced = enc.total_out() as usize;

                let mut dec = Decompress::new_with_window_bits(15);
                let mut output = vec![0u8; input.len() + 4096];
                let status = dec
                    .decompress(&compressed[..produced], &mut output, Flush::Finish)
                    .unwrap();
                assert_eq!(status, Status::StreamEnd, "thread {i} decompress");
                assert_eq!(
                    &output[..dec.total_out() as usize],
                    &input[..],
                    "thread {i} mismatch"
                );
            })
        })
        .collect();

    for h in handles {
        h.join().expect("worker thread panicked");
    }
}

/// After `reset`, `total_in`/`total_out` return to zero and a subsequent
/// call behaves exactly like a freshly constructed stream.
#[test]
fn reset_matches_fresh_stream_behavior() {
    let mut enc = Compress::new_with_window_bits(Compression::default(), 15);
    let mut scratch = vec![0u8; 1024];
    enc.compress(b"priming the stream", &mut scratch, Flush::Finish)
        .unwrap();
    assert!(enc.total_in() > 0);

    enc.reset();
    assert_eq!(enc.total_in(), 0);
    assert_eq!(enc.total_out(), 0);

    let mut out_after_reset = vec![0u8; 32];
    let status = enc.compress(b" ", &mut out_after_reset, Flush::Finish).unwrap();
    assert_eq!(status, Status::StreamEnd);
    let produced = enc.total_out() as usize;
    assert_eq!(
        &out_after_reset[..produced],
        &[0x78, 0x9c, 0x4a, 0x04, 0x00, 0x00, 0x21, 0x00, 0x21]
    );
}
