// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use ambercoin::chain::{Chain, SkipFlags};
use ambercoin::node::WriteQueue;
use ambercoin::settings::SETTINGS;
use chrono::Utc;
use log::*;
use parking_lot::RwLock;
use std::time::Duration;
use triomphe::Arc;

fn main() {
    pretty_env_logger::init_timed();

    let config = SETTINGS.chain_config();
    info!(
        "starting ambercoin node on network {} (data dir {})",
        config.network_name,
        config.data_dir.display()
    );

    let hold_time = Duration::from_millis(config.write_lock_hold_time_ms);
    let chain = match Chain::open(config) {
        Ok(chain) => Arc::new(RwLock::new(chain)),
        Err(err) => {
            error!("failed to open chain state: {err:?}");
            std::process::exit(1);
        }
    };

    {
        let guard = chain.read();
        let dgp = guard.db.dgp();
        info!(
            "head block {} at {}, supply {}",
            dgp.head_block_number, dgp.time, dgp.current_supply
        );
    }

    let queue = WriteQueue::spawn(chain.clone(), hold_time);
    let producer = SETTINGS.witness_signing_key();

    match &producer {
        Some((witness, _)) => info!("producing blocks as witness {witness}"),
        None => info!("running as a non-producing node"),
    }

    // Production loop. Networking and RPC plugins attach through the
    // write queue and the chain's read lock; without them this node
    // only produces blocks for a locally configured witness.
    loop {
        std::thread::sleep(Duration::from_millis(250));

        let Some((witness, signing_key)) = &producer else {
            continue;
        };

        let now = Utc::now().timestamp() as u64;
        let (slot_time, scheduled) = {
            let guard = chain.read();
            let slot = guard.db.get_slot_at_time(now);
            if slot == 0 {
                continue;
            }
            let slot_time = guard.db.get_slot_time(slot);
            let scheduled = guard.db.get_scheduled_witness(slot).ok();
            (slot_time, scheduled)
        };

        if slot_time > now || scheduled.as_deref() != Some(witness.as_str()) {
            continue;
        }

        match queue.generate_block(
            slot_time,
            witness.clone(),
            signing_key.clone(),
            SkipFlags::empty(),
        ) {
            Ok(block) => info!(
                "produced block {} with {} transactions",
                block.header.number,
                block.transactions.len()
            ),
            Err(err) => warn!("failed to produce block for slot {slot_time}: {err:?}"),
        }
    }
}
