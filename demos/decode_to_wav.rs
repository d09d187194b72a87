// A minimal example of using this crate together with Hound to decode a
// FLAC file to a WAV file. This can be done more efficiently by streaming
// fixed-size chunks instead of buffering a whole read_s32 call, but this
// keeps the example short.

use std::env;
use std::path::Path;

fn decode_file(fname: &Path) {
    let mut reader = flacon::FlacReader::open(fname).expect("failed to open FLAC stream");
    let streaminfo = *reader.streaminfo();

    let spec = hound::WavSpec {
        channels: streaminfo.channels as u16,
        sample_rate: streaminfo.sample_rate,
        bits_per_sample: streaminfo.bits_per_sample as u16,
        sample_format: hound::SampleFormat::Int,
    };

    let fname_wav = fname.with_extension("wav");
    let mut wav_writer = hound::WavWriter::create(fname_wav, spec).expect("failed to create wav file");

    let chunk_frames = streaminfo.max_block_size_samples().max(1);

    if streaminfo.bits_per_sample <= 16 {
        let mut samples = Vec::new();
        loop {
            samples.clear();
            let produced = reader.read_s16(chunk_frames, &mut samples).expect("failed to decode FLAC stream");
            if produced == 0 {
                break;
            }
            for &s in &samples {
                wav_writer.write_sample(s).expect("failed to write wav file");
            }
        }
    } else {
        let mut samples = Vec::new();
        loop {
            samples.clear();
            let produced = reader.read_s32(chunk_frames, &mut samples).expect("failed to decode FLAC stream");
            if produced == 0 {
                break;
            }
            for &s in &samples {
                wav_writer.write_sample(s).expect("failed to write wav file");
            }
        }
    }

    wav_writer.finalize().expect("failed to finalize wav file");
}

fn main() {
    let mut no_args = true;

    for fname in env::args().skip(1) {
        no_args = false;
        print!("{}", fname);
        decode_file(Path::new(&fname));
        println!(": done");
    }

    if no_args {
        println!("usage: decode_to_wav <file.flac>...");
    }
}
