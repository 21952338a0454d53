mod common;

use std::io::{self, Read};

use common::{Animal, cat, default_animal, dog, setup};
use polyjson::{DecodeOptions, Registry, StreamDeserializer};

/// A reader that hands out at most `chunk` bytes per call.
struct ChunkReader<'a> {
    data: &'a [u8],
    chunk: usize,
    reads: usize,
}

impl<'a> ChunkReader<'a> {
    fn new(data: &'a [u8], chunk: usize) -> Self {
        Self {
            data,
            chunk,
            reads: 0,
        }
    }
}

impl Read for ChunkReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        self.reads += 1;
        Ok(n)
    }
}

fn zoo(len: u32) -> Vec<Animal> {
    (0..len)
        .map(|id| match id % 3 {
            0 => dog(id, id % 2 == 0),
            1 => cat(id, (id % 9) as u8),
            _ => default_animal(id),
        })
        .collect()
}

#[test]
fn thousand_models_through_sixteen_byte_chunks() {
    setup();
    let animals = zoo(1000);
    let json = polyjson::to_string(&animals).unwrap();

    let mut reader = ChunkReader::new(json.as_bytes(), 16);
    let mut stream = StreamDeserializer::new(&mut reader);
    let decoded: Vec<Animal> = stream.decode_array().unwrap();
    assert_eq!(stream.position(), json.len());
    stream.end().unwrap();
    drop(stream);

    assert_eq!(decoded, animals);
    assert!(reader.reads > json.len() / 16);
}

#[test]
fn chunk_size_does_not_change_the_result() {
    setup();
    let animals = zoo(40);
    let json = polyjson::to_string_pretty(&animals).unwrap();

    for chunk in [1, 2, 5, 16, 33, 4096] {
        for capacity in [1, 8, 64] {
            let options = DecodeOptions::new().buffer_capacity(capacity);
            let reader = ChunkReader::new(json.as_bytes(), chunk);
            let mut stream = StreamDeserializer::with_registry(reader, Registry::global(), options);
            let decoded: Vec<Animal> = stream.decode_array().unwrap();
            assert_eq!(decoded, animals, "chunk {chunk}, capacity {capacity}");
            assert_eq!(stream.position(), json.len(), "chunk {chunk}, capacity {capacity}");
        }
    }
}

#[test]
fn positions_after_each_object_match_the_slice() {
    setup();
    let animals = zoo(12);
    let mut json = String::new();
    let mut ends = Vec::new();
    for animal in &animals {
        json.push_str(&polyjson::to_string(animal).unwrap());
        ends.push(json.len());
        json.push_str(" \n");
    }

    let mut stream = StreamDeserializer::new(ChunkReader::new(json.as_bytes(), 7));
    for (animal, end) in animals.iter().zip(ends) {
        let decoded: Animal = stream.decode().unwrap();
        assert_eq!(&decoded, animal);
        assert_eq!(stream.position(), end);
    }
    stream.end().unwrap();
}

#[test]
fn large_sibling_values_grow_the_buffer() {
    setup();
    let padding = "x".repeat(10_000);
    let json = format!(r#"{{"Note":"{padding}","Nested":[[[{{"_t":"cat"}}]]],"Id":5,"_t":"dog","CanBark":true}}"#);

    let options = DecodeOptions::new().buffer_capacity(32);
    let reader = ChunkReader::new(json.as_bytes(), 100);
    let mut stream = StreamDeserializer::with_registry(reader, Registry::global(), options);
    let animal: Animal = stream.decode().unwrap();
    assert_eq!(animal, dog(5, true));
    assert_eq!(stream.position(), json.len());
}

#[test]
fn truncated_stream_is_a_protocol_error() {
    setup();
    let json = polyjson::to_string(&zoo(3)).unwrap();
    let truncated = &json.as_bytes()[..json.len() - 5];

    let mut stream = StreamDeserializer::new(ChunkReader::new(truncated, 16));
    let err = stream.decode_array::<Animal>().unwrap_err();
    assert!(err.is_protocol(), "{err}");
}
