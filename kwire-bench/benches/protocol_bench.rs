//! Codec and framing benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kwire_protocol::messages::{DeletableTopicResult, DeleteTopicsRequest, DeleteTopicsResponse};
use kwire_protocol::{
    encode_request, encode_response, Decode, FrameDecoder, Message, Reader, RequestHeader,
    ResponseHeader,
};

fn topics(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("orders.events.{:05}", i)).collect()
}

fn create_test_response(count: usize) -> DeleteTopicsResponse {
    DeleteTopicsResponse {
        version: 1,
        throttle_time_ms: 0,
        responses: topics(count)
            .into_iter()
            .enumerate()
            .map(|(i, name)| DeletableTopicResult {
                name,
                error_code: if i % 10 == 0 { 3 } else { 0 },
            })
            .collect(),
    }
}

fn header() -> RequestHeader {
    RequestHeader {
        api_key: 20,
        api_version: 1,
        correlation_id: 1,
        client_id: Some("bench".to_string()),
    }
}

fn bench_request_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_topics_request_encode");

    for count in [1, 100, 10000] {
        let mut request = DeleteTopicsRequest::new(topics(count), Some(30_000));
        request.version = 1;
        let header = header();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &request, |b, request| {
            b.iter(|| black_box(encode_request(&header, request).unwrap()));
        });
    }

    group.finish();
}

fn bench_response_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_topics_response_encode");

    for count in [1, 100, 10000] {
        let response = create_test_response(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &response,
            |b, response| {
                b.iter(|| black_box(encode_response(1, response).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_response_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_topics_response_decode");

    for count in [1, 100, 10000] {
        let encoded = encode_response(1, &create_test_response(count)).unwrap().freeze();

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &encoded, |b, encoded| {
            b.iter(|| {
                let mut decoder = FrameDecoder::new(encoded.len());
                decoder.extend(encoded);
                let mut reader = Reader::new(decoder.decode_frame().unwrap().unwrap());
                ResponseHeader::decode(&mut reader).unwrap();
                let response = DeleteTopicsResponse::read_from(&mut reader, 1).unwrap();
                reader.finish().unwrap();
                black_box(response)
            });
        });
    }

    group.finish();
}

fn bench_frame_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_split");

    for size in [100, 1000, 10000] {
        let mut stream = Vec::new();
        for _ in 0..16 {
            stream.extend_from_slice(&(size as i32).to_be_bytes());
            stream.extend(std::iter::repeat(0x42u8).take(size));
        }
        let stream = Bytes::from(stream);

        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &stream, |b, stream| {
            b.iter(|| {
                let mut decoder = FrameDecoder::new(size);
                decoder.extend(stream);
                let mut frames = 0;
                while let Some(frame) = decoder.decode_frame().unwrap() {
                    black_box(frame);
                    frames += 1;
                }
                frames
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_request_encode,
    bench_response_encode,
    bench_response_decode,
    bench_frame_split,
);

criterion_main!(benches);
