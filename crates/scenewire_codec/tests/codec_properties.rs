//! Property tests for the codec building blocks.
//!
//! Round trips for every count width, frame skipping, and decoders fed
//! arbitrary bytes.

use bytemuck::{Pod, Zeroable};
use proptest::prelude::*;
use scenewire_codec::{
    read_bytes, read_map, read_sequence, read_string, write_bytes, write_framed, write_map,
    write_sequence, write_string, CodecError, Fixed, Frame, FramedHeader, WireInt, WireReader,
    WireWriter,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct Header {
    kind: u32,
    message_size: u32,
}

impl Fixed for Header {}

impl FramedHeader for Header {
    fn message_size(&self) -> u32 {
        self.message_size
    }
}

fn sequence_round_trip<W: WireInt>(items: &[u32]) -> Vec<u32> {
    let mut w = WireWriter::new();
    write_sequence::<W, u32>(&mut w, items).unwrap();
    let mut r = WireReader::new(w.as_slice());
    let out = read_sequence::<W, u32>(&mut r).unwrap();
    assert!(r.is_exhausted());
    out
}

fn string_round_trip<W: WireInt>(value: &str) -> String {
    let mut w = WireWriter::new();
    write_string::<W>(&mut w, value).unwrap();
    let mut r = WireReader::new(w.as_slice());
    read_string::<W>(&mut r).unwrap()
}

proptest! {
    #[test]
    fn sequences_round_trip_for_every_width(items in prop::collection::vec(any::<u32>(), 0..200)) {
        prop_assert_eq!(&sequence_round_trip::<u8>(&items), &items);
        prop_assert_eq!(&sequence_round_trip::<u16>(&items), &items);
        prop_assert_eq!(&sequence_round_trip::<u32>(&items), &items);
        prop_assert_eq!(&sequence_round_trip::<u64>(&items), &items);
    }

    #[test]
    fn strings_round_trip_for_every_width(value in "\\PC{0,60}") {
        prop_assert_eq!(&string_round_trip::<u8>(&value), &value);
        prop_assert_eq!(&string_round_trip::<u16>(&value), &value);
        prop_assert_eq!(&string_round_trip::<u32>(&value), &value);
        prop_assert_eq!(&string_round_trip::<u64>(&value), &value);
    }

    #[test]
    fn bytes_and_maps_round_trip(
        bytes in prop::collection::vec(any::<u8>(), 0..300),
        pairs in prop::collection::vec((any::<u32>(), any::<i64>()), 0..50),
    ) {
        let mut w = WireWriter::new();
        write_bytes::<u16>(&mut w, &bytes).unwrap();
        write_map::<u32, u32, i64>(&mut w, &pairs).unwrap();

        let mut r = WireReader::new(w.as_slice());
        prop_assert_eq!(read_bytes::<u16>(&mut r).unwrap(), bytes);
        prop_assert_eq!(read_map::<u32, u32, i64>(&mut r).unwrap(), pairs);
        prop_assert!(r.is_exhausted());
    }

    #[test]
    fn skipping_a_frame_lands_where_decoding_does(
        payload in prop::collection::vec(any::<u64>(), 0..40),
        trailer in any::<u32>(),
    ) {
        let mut w = WireWriter::new();
        let header = Header { kind: 9999, message_size: 0 };
        write_framed(&mut w, &header, |w| write_sequence::<u32, u64>(w, &payload)).unwrap();
        w.write_u32(trailer);
        let bytes = w.into_bytes();

        let mut decoding = WireReader::new(&bytes);
        let h: Header = decoding.read_fixed().unwrap();
        let decoded = Frame::open(&mut decoding, h.message_size())
            .unwrap()
            .decode_exact(read_sequence::<u32, u64>)
            .unwrap();
        prop_assert_eq!(decoded, payload);

        let mut skipping = WireReader::new(&bytes);
        let h: Header = skipping.read_fixed().unwrap();
        let _ = Frame::open(&mut skipping, h.message_size()).unwrap().skip();

        prop_assert_eq!(decoding.position(), skipping.position());
        prop_assert_eq!(skipping.read_u32().unwrap(), trailer);
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut r = WireReader::new(&bytes);
        let _ = read_sequence::<u64, (u32, u64)>(&mut r);
        let mut r = WireReader::new(&bytes);
        let _ = read_string::<u32>(&mut r);
        let mut r = WireReader::new(&bytes);
        let _ = read_map::<u8, u16, f64>(&mut r);
    }

    #[test]
    fn truncated_sequences_report_incomplete(
        items in prop::collection::vec(any::<u32>(), 1..50),
        cut in 1usize..4,
    ) {
        let mut w = WireWriter::new();
        write_sequence::<u32, u32>(&mut w, &items).unwrap();
        let bytes = w.as_slice();
        let mut r = WireReader::new(&bytes[..bytes.len() - cut]);
        let err = read_sequence::<u32, u32>(&mut r).unwrap_err();
        prop_assert!(err.is_incomplete());
        let overflow = matches!(err, CodecError::LengthOverflow { .. });
        prop_assert!(overflow, "expected LengthOverflow, got {:?}", err);
    }
}
