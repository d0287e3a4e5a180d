// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::StoreErr;
use crate::chain::ChainConfig;
use log::*;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::PathBuf;

const MAGIC: &[u8; 8] = b"AMBRSEG\0";
const VERSION: u32 = 1;

/// magic + version + payload length + blake3 checksum
const HEADER_SIZE: usize = 8 + 4 + 8 + 32;

/// The single memory-mapped backing file of a node. Holds one state
/// snapshot at a time: a fixed header followed by the bincode payload of
/// every table. The snapshot is rewritten in place on flush; the header
/// checksum is written last so a torn flush is detected on the next open
/// rather than silently replayed.
#[derive(Debug)]
pub struct Segment {
    path: Option<PathBuf>,
    map: MmapMut,
    autoscale: bool,
    scale_percent: u64,
}

impl Segment {
    /// Open (or create) the backing segment and return any valid
    /// snapshot payload found in it. A fresh or empty segment yields
    /// `None`; a non-empty segment that fails validation is corruption
    /// and the caller must resync from genesis.
    pub fn open(config: &ChainConfig) -> Result<(Self, Option<Vec<u8>>), StoreErr> {
        let initial = (config.segment_initial_bytes as usize).max(HEADER_SIZE);

        if config.memory_only {
            let map = MmapMut::map_anon(initial)?;
            return Ok((
                Self {
                    path: None,
                    map,
                    autoscale: config.segment_autoscale,
                    scale_percent: config.segment_scale_percent.max(101),
                },
                None,
            ));
        }

        std::fs::create_dir_all(&config.data_dir)?;
        let path = config.segment_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let existing_len = file.metadata()?.len() as usize;
        let fresh = existing_len == 0;
        if fresh {
            file.set_len(initial as u64)?;
        }

        let map = unsafe { MmapOptions::new().map_mut(&file)? };
        let segment = Self {
            path: Some(path),
            map,
            autoscale: config.segment_autoscale,
            scale_percent: config.segment_scale_percent.max(101),
        };

        if fresh {
            return Ok((segment, None));
        }

        let payload = segment.read_snapshot()?;
        Ok((segment, payload))
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_snapshot(&self) -> Result<Option<Vec<u8>>, StoreErr> {
        if self.map.len() < HEADER_SIZE {
            return Err(StoreErr::Corruption("segment shorter than header"));
        }

        let header = &self.map[..HEADER_SIZE];
        if header[..8] == [0u8; 8] {
            // Allocated but never flushed
            return Ok(None);
        }
        if &header[..8] != MAGIC {
            return Err(StoreErr::Corruption("bad segment magic"));
        }

        let version = u32::from_le_bytes(header[8..12].try_into().unwrap());
        if version != VERSION {
            return Err(StoreErr::Corruption("unsupported segment version"));
        }

        let payload_len = u64::from_le_bytes(header[12..20].try_into().unwrap()) as usize;
        if HEADER_SIZE + payload_len > self.map.len() {
            return Err(StoreErr::Corruption("payload length beyond segment"));
        }

        let payload = &self.map[HEADER_SIZE..HEADER_SIZE + payload_len];
        let checksum: [u8; 32] = header[20..52].try_into().unwrap();
        if *blake3::hash(payload).as_bytes() != checksum {
            return Err(StoreErr::Corruption("snapshot checksum mismatch"));
        }

        Ok(Some(payload.to_vec()))
    }

    /// Write a snapshot payload. Grows the segment if needed (and
    /// allowed); payload first, header last.
    pub fn write_snapshot(&mut self, payload: &[u8]) -> Result<(), StoreErr> {
        let needed = HEADER_SIZE + payload.len();
        self.ensure_capacity(needed)?;

        self.map[HEADER_SIZE..needed].copy_from_slice(payload);

        let mut header = [0u8; HEADER_SIZE];
        header[..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&VERSION.to_le_bytes());
        header[12..20].copy_from_slice(&(payload.len() as u64).to_le_bytes());
        header[20..52].copy_from_slice(blake3::hash(payload).as_bytes());
        self.map[..HEADER_SIZE].copy_from_slice(&header);

        self.map.flush()?;
        Ok(())
    }

    /// Grow-and-remap. Existing contents survive the remap; with
    /// autoscale disabled the caller gets a clean out-of-space error and
    /// the segment is untouched.
    fn ensure_capacity(&mut self, needed: usize) -> Result<(), StoreErr> {
        let capacity = self.map.len();
        if needed <= capacity {
            return Ok(());
        }

        if !self.autoscale {
            return Err(StoreErr::OutOfSpace {
                needed: needed as u64,
                capacity: capacity as u64,
            });
        }

        let scaled = (capacity as u64).saturating_mul(self.scale_percent) / 100;
        let new_capacity = scaled.max(needed as u64) as usize;
        debug!(
            "growing backing segment {} -> {} bytes",
            capacity, new_capacity
        );

        match &self.path {
            Some(path) => {
                let file = OpenOptions::new().read(true).write(true).open(path)?;
                file.set_len(new_capacity as u64)?;
                self.map = unsafe { MmapOptions::new().map_mut(&file)? };
            }
            None => {
                let mut grown = MmapMut::map_anon(new_capacity)?;
                grown[..capacity].copy_from_slice(&self.map);
                self.map = grown;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn tmp_config(autoscale: bool, initial: u64) -> ChainConfig {
        let mut config = ChainConfig::new("segtest");
        let mut dir = std::env::temp_dir();
        dir.push(hex::encode(rand::thread_rng().gen::<[u8; 16]>()));
        config.data_dir = dir;
        config.segment_initial_bytes = initial;
        config.segment_autoscale = autoscale;
        config
    }

    #[test]
    fn fresh_segment_has_no_snapshot() {
        let config = tmp_config(true, 4096);
        let (_, payload) = Segment::open(&config).unwrap();
        assert!(payload.is_none());
    }

    #[test]
    fn snapshot_roundtrips_across_reopen() {
        let config = tmp_config(true, 4096);
        {
            let (mut segment, _) = Segment::open(&config).unwrap();
            segment.write_snapshot(b"chain state payload").unwrap();
        }
        let (_, payload) = Segment::open(&config).unwrap();
        assert_eq!(payload.unwrap(), b"chain state payload");
    }

    #[test]
    fn grows_on_demand_when_autoscaled() {
        let config = tmp_config(true, 4096);
        let (mut segment, _) = Segment::open(&config).unwrap();
        let big = vec![7u8; 64 * 1024];
        segment.write_snapshot(&big).unwrap();
        assert!(segment.capacity() >= (HEADER_SIZE + big.len()) as u64);

        let (_, payload) = Segment::open(&config).unwrap();
        assert_eq!(payload.unwrap(), big);
    }

    #[test]
    fn out_of_space_without_autoscale() {
        let config = tmp_config(false, 4096);
        let (mut segment, _) = Segment::open(&config).unwrap();
        let big = vec![7u8; 64 * 1024];
        let err = segment.write_snapshot(&big).unwrap_err();
        assert!(matches!(err, StoreErr::OutOfSpace { .. }));
        // The segment stays usable for snapshots that fit
        segment.write_snapshot(b"small").unwrap();
    }

    #[test]
    fn corrupted_payload_is_detected() {
        let config = tmp_config(true, 4096);
        {
            let (mut segment, _) = Segment::open(&config).unwrap();
            segment.write_snapshot(b"authentic payload").unwrap();
        }

        let path = config.segment_path();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_SIZE + 2] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let err = Segment::open(&config).unwrap_err();
        assert_eq!(err, StoreErr::Corruption("snapshot checksum mismatch"));
    }

    #[test]
    fn memory_only_segment_grows() {
        let mut config = tmp_config(true, 4096);
        config.memory_only = true;
        let (mut segment, payload) = Segment::open(&config).unwrap();
        assert!(payload.is_none());
        segment.write_snapshot(&vec![1u8; 32 * 1024]).unwrap();
    }
}
