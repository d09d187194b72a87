// Seeks to a PCM-frame index given on the command line and prints the next
// few samples of each channel, to exercise and demonstrate FlacReader::seek.

use std::env;
use std::path::Path;

use flacon::seek::SeekStrategies;

fn main() {
    let mut args = env::args().skip(1);
    let fname = args.next().expect("usage: seek_and_dump <file.flac> <target_frame>");
    let target: u64 = args.next().and_then(|s| s.parse().ok()).expect("target_frame must be a number");

    let mut reader = flacon::FlacReader::open(Path::new(&fname)).expect("failed to open FLAC stream");

    reader.seek(target, SeekStrategies::ALL).expect("seek failed");
    println!("landed at PCM frame {}", reader.position());

    let mut samples = Vec::new();
    let channels = reader.streaminfo().channels as usize;
    let produced = reader.read_s32(8, &mut samples).expect("failed to decode FLAC stream");

    for frame in samples.chunks(channels).take(produced) {
        println!("{:?}", frame);
    }
}
