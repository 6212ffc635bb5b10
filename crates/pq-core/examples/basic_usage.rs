use pq_core::{CreateOptions, Direction, Product};

fn main() -> pq_core::Result<()> {
    let path = std::env::temp_dir().join("pq-core-example.pq");
    let mut queue = pq_core::Queue::create(&path, CreateOptions::default().no_clobber(false))?;

    for seqno in 0..5u32 {
        let mut signature = [0u8; 16];
        signature[15] = seqno as u8;
        let product = Product {
            origin: "example-station".into(),
            feedtype: 1,
            seqno,
            arrival: (seqno as i64, 0),
            ident: format!("obs-{seqno:04}"),
            signature,
            data: format!("payload for product {seqno}").into_bytes(),
        };
        match queue.insert(&product) {
            Ok(()) => println!("inserted seqno={seqno}"),
            Err(pq_core::Error::Dup) => println!("seqno={seqno} already present, skipped"),
            Err(e) => return Err(e),
        }
    }

    println!("\nconsuming in insertion order:");
    loop {
        let result = queue.sequence(Direction::Gt, None, |meta, data| {
            println!(
                "  seqno={} ident={} bytes={}",
                meta.header.seqno,
                meta.header.ident,
                data.len()
            );
            Ok(())
        });
        match result {
            Ok(()) => {}
            Err(pq_core::Error::End) => break,
            Err(e) => return Err(e),
        }
    }

    let stats = queue.stats();
    println!("\nresident products: {}", stats.slots_in_use);
    queue.close()?;
    std::fs::remove_file(&path).ok();
    Ok(())
}
