use std::io::Cursor;
use std::time::Duration;

use divan::Bencher;
use mp3parse::{Mp3Parser, Mp3Stream, ParserError};

mod shared;
use shared::{cbr_stream, vbr_stream, xing_stream};

fn main() {
    divan::main();
}

#[divan::bench]
fn parse_cbr(bencher: Bencher) {
    bencher.with_inputs(cbr_stream).bench_values(|data| {
        let mut parser = Mp3Parser::new(Cursor::new(data));
        parser.parse().unwrap();
        divan::black_box(*parser.track_info())
    })
}

#[divan::bench]
fn parse_vbr_without_header(bencher: Bencher) {
    bencher.with_inputs(vbr_stream).bench_values(|data| {
        let mut parser = Mp3Parser::new(Cursor::new(data));
        parser.parse().unwrap();
        divan::black_box(*parser.track_info())
    })
}

#[divan::bench]
fn seek_xing(bencher: Bencher) {
    let mut parser = Mp3Parser::new(Cursor::new(xing_stream()));
    parser.parse().unwrap();
    bencher.bench_local(|| {
        for ms in (0..60_000).step_by(1000) {
            let mut ms = ms;
            parser.seek_to_time(&mut ms).unwrap();
            divan::black_box(ms);
        }
    })
}

#[divan::bench]
fn read_work_units(bencher: Bencher) {
    bencher
        .with_inputs(|| Mp3Stream::from_parser(Mp3Parser::new(Cursor::new(cbr_stream()))).unwrap())
        .bench_values(|mut stream| {
            stream.set_position(Duration::ZERO).unwrap();
            let mut buf = vec![0u8; stream.buffer_requirements().buffer_size];
            loop {
                match stream.next_work_unit(&mut buf) {
                    Ok(unit) => divan::black_box_drop(unit),
                    Err(ParserError::EndOfStream) => break,
                    Err(err) => panic!("{err}"),
                }
            }
        })
}
