//! Property tests for the invariants in §8, run against the public sans-I/O API with
//! `quickcheck`-generated inputs rather than hand-picked examples.

mod support;

use bytes::Bytes;
use http::{HeaderMap, Method};
use quickcheck::{quickcheck, TestResult};

use duohttp::{Pseudo, StreamId};
use support::{drain, handshake_h2, new_pair};

/// Builds the wire bytes for a single complete GET request by running it through a
/// real client `Connection`, so the generated bytes stay a well-formed h2 stream.
fn sample_request_bytes() -> Vec<u8> {
    let (mut client, mut server, client_rec, server_rec) = new_pair();
    handshake_h2(&mut client, &mut server, &client_rec, &server_rec);
    let pseudo = Pseudo::request(
        Method::GET,
        Bytes::from_static(b"/chunked"),
        Some(Bytes::from_static(b"https")),
        Some(Bytes::from_static(b"example.com")),
    );
    client.write_message(None, pseudo, HeaderMap::new(), true).unwrap();
    drain(&client_rec)
}

/// Invariant 4 — splitting inbound bytes across arbitrarily many `data_received` calls
/// never changes the resulting callback sequence versus delivering them in one call.
#[test]
fn byte_chunking_independence() {
    fn prop(mut split_points: Vec<u8>) -> TestResult {
        let bytes = sample_request_bytes();
        if bytes.is_empty() {
            return TestResult::discard();
        }

        let (_, mut whole_server, _, whole_rec) = new_pair();
        whole_server.made(duohttp::Version::Http2).unwrap();
        whole_server.data_received(duohttp::PREFACE).unwrap();
        whole_server.data_received(&bytes).unwrap();

        let (_, mut chunked_server, _, chunked_rec) = new_pair();
        chunked_server.made(duohttp::Version::Http2).unwrap();
        chunked_server.data_received(duohttp::PREFACE).unwrap();

        split_points.sort_unstable();
        let mut offset = 0;
        for point in split_points {
            let cut = (point as usize % (bytes.len() - offset + 1)).min(bytes.len() - offset);
            if cut == 0 {
                continue;
            }
            chunked_server.data_received(&bytes[offset..offset + cut]).unwrap();
            offset += cut;
        }
        if offset < bytes.len() {
            chunked_server.data_received(&bytes[offset..]).unwrap();
        }

        TestResult::from_bool(
            whole_rec.borrow().messages == chunked_rec.borrow().messages
                && whole_rec.borrow().ends == chunked_rec.borrow().ends
                && whole_rec.borrow().data == chunked_rec.borrow().data,
        )
    }
    quickcheck(prop as fn(Vec<u8>) -> TestResult);
}

/// Invariant 1 — a client's locally-initiated stream ids are always odd and strictly
/// increasing, regardless of how many requests are written back to back.
#[test]
fn client_stream_ids_are_odd_and_monotonic() {
    fn prop(request_count: u8) -> TestResult {
        let count = (request_count % 20) as usize;
        if count == 0 {
            return TestResult::discard();
        }
        let (mut client, _server, _client_rec, _server_rec) = new_pair();
        client.made(duohttp::Version::Http2).unwrap();

        let mut ids = Vec::new();
        for _ in 0..count {
            let pseudo = Pseudo::request(Method::GET, Bytes::from_static(b"/"), Some(Bytes::from_static(b"https")), None);
            ids.push(client.write_message(None, pseudo, HeaderMap::new(), true).unwrap());
        }

        let odd_and_increasing = ids.windows(2).all(|w| w[1].as_u32() > w[0].as_u32())
            && ids.iter().all(|id| id.as_u32() % 2 == 1);
        TestResult::from_bool(odd_and_increasing)
    }
    quickcheck(prop as fn(u8) -> TestResult);
}

/// Invariant 5 — flow-control windows never silently go out of range: a run of
/// WINDOW_UPDATE increments that would push a stream's tracked send window past the
/// protocol's signed 31-bit ceiling always resets exactly that stream rather than
/// wrapping, applying partially, or bringing the connection down.
#[test]
fn flow_window_increases_never_silently_overflow() {
    fn prop(increments: Vec<u32>) -> TestResult {
        if increments.is_empty() || increments.len() > 8 {
            return TestResult::discard();
        }
        let (mut client, mut server, client_rec, server_rec) = new_pair();
        handshake_h2(&mut client, &mut server, &client_rec, &server_rec);
        let pseudo = Pseudo::request(
            Method::POST,
            Bytes::from_static(b"/"),
            Some(Bytes::from_static(b"https")),
            None,
        );
        let id = client.write_message(None, pseudo, HeaderMap::new(), false).unwrap();
        server.data_received(&drain(&client_rec)).unwrap();

        // `increase_flow_window` only emits a WINDOW_UPDATE frame; the overflow check
        // lives on the receiving side, so the increments are free to be sent as-is.
        for inc in &increments {
            server.increase_flow_window(id, *inc).unwrap();
        }
        let frames = drain(&server_rec);

        let mut total: i64 = i64::from(duohttp::Settings::STANDARD.initial_window_size);
        let mut should_overflow = false;
        for inc in &increments {
            total += i64::from(*inc);
            if total > i64::from(0x7FFF_FFFFu32) {
                should_overflow = true;
                break;
            }
        }

        // A per-stream overflow resets only that stream; it never faults the connection.
        if client.data_received(&frames).is_err() {
            return TestResult::failed();
        }
        let was_reset = client_rec.borrow().stream_ends.contains(&id);
        TestResult::from_bool(was_reset == should_overflow)
    }
    quickcheck(prop as fn(Vec<u32>) -> TestResult);
}

/// Invariant 6 — once `on_message_end` has fired for a stream, no late or duplicate
/// frame for that stream id produces another inbound data callback.
#[test]
fn no_callbacks_after_message_end_even_with_late_frames() {
    fn prop(late_frame_count: u8) -> TestResult {
        let count = (late_frame_count % 5) as usize;
        let (mut client, mut server, client_rec, server_rec) = new_pair();
        handshake_h2(&mut client, &mut server, &client_rec, &server_rec);

        let pseudo = Pseudo::request(Method::GET, Bytes::from_static(b"/"), Some(Bytes::from_static(b"https")), None);
        let id = client.write_message(None, pseudo, HeaderMap::new(), true).unwrap();
        server.data_received(&drain(&client_rec)).unwrap();
        assert_eq!(server_rec.borrow().ends, vec![id]);

        for _ in 0..count {
            let frame = support::raw_frame(support::FRAME_DATA, 0, id.as_u32(), b"late");
            // The stream no longer accepts DATA once its inbound half finalized; late
            // frames are tolerated (ignored) rather than crashing the connection.
            let _ = server.data_received(&frame);
        }

        TestResult::from_bool(server_rec.borrow().data.is_empty() && server_rec.borrow().ends == vec![id])
    }
    quickcheck(prop as fn(u8) -> TestResult);
}
