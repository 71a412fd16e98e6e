// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Payload chunking
//!
//! Multi-APDU commands stream logical records (eg. an input header, or an
//! input script with its sequence number). Each record starts a new APDU,
//! records longer than the chunk limit are split such that the final chunk
//! carries the record's indivisible tail (and at least one byte before it),
//! as the app rejects a sequence number arriving without its script.

use alloc::vec::Vec;

use crate::Error;

/// Chunk of a larger payload
#[derive(Clone, PartialEq, Debug)]
pub struct Chunk<'a> {
    /// Set for the first chunk of the payload
    pub first: bool,
    /// Set for the final chunk of the payload
    pub last: bool,
    pub data: &'a [u8],
}

/// Split a payload into chunks of at most `max` bytes
///
/// An empty payload yields a single empty chunk, so commands with no data
/// still produce one APDU.
pub fn chunks(payload: &[u8], max: usize) -> Result<Vec<Chunk<'_>>, Error> {
    if max == 0 {
        return Err(Error::InvalidParameter);
    }

    if payload.is_empty() {
        return Ok(alloc::vec![Chunk {
            first: true,
            last: true,
            data: payload,
        }]);
    }

    let n = payload.chunks(max).count();
    let c = payload
        .chunks(max)
        .enumerate()
        .map(|(i, data)| Chunk {
            first: i == 0,
            last: i == n - 1,
            data,
        })
        .collect();

    Ok(c)
}

/// Logical record streamed to the device
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Record {
    pub data: Vec<u8>,

    /// Length of the trailing field that must not be split from the
    /// preceding bytes (eg. 4 for an input sequence number)
    pub tail: usize,
}

impl Record {
    /// Create a record that may be split anywhere
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, tail: 0 }
    }

    /// Create a record with an indivisible trailing field
    pub fn with_tail(data: Vec<u8>, tail: usize) -> Self {
        Self { data, tail }
    }
}

/// Frame records into APDU payloads of at most `max` bytes
pub fn frame_records(records: &[Record], max: usize) -> Result<Vec<Vec<u8>>, Error> {
    let mut payloads = Vec::new();

    for r in records {
        if r.tail > r.data.len() || (r.tail > 0 && r.tail + 1 > max) || max == 0 {
            return Err(Error::InvalidParameter);
        }

        let mut rest = &r.data[..];
        while rest.len() > max {
            // Leave enough behind for the final chunk to hold the tail
            // plus at least one preceding byte
            let reserve = match r.tail {
                0 => 0,
                t => t + 1,
            };
            let take = max.min(rest.len() - reserve);

            payloads.push(rest[..take].to_vec());
            rest = &rest[take..];
        }

        payloads.push(rest.to_vec());
    }

    Ok(payloads)
}
