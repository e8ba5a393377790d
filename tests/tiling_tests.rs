use image::{ImageBuffer, Rgba, RgbaImage};
use lsb_mix::constants::BLOCK_SIZE;
use lsb_mix::error::StegoError;
use lsb_mix::steganography::BitDepth;
use lsb_mix::tiling::{Block, Job, Scheduler, block_grid};
use rand::RngCore;
use std::sync::atomic::{AtomicUsize, Ordering};

fn random_image(width: u32, height: u32) -> RgbaImage {
    let mut raw_pixels = vec![0u8; (width * height * 4) as usize];
    rand::rng().fill_bytes(&mut raw_pixels);
    ImageBuffer::from_raw(width, height, raw_pixels).expect("Buffer size matches dimensions.")
}

#[test]
fn test_block_grid_clips_last_row_and_column() -> anyhow::Result<()> {
    let blocks = block_grid(33, 20, 16)?;
    assert_eq!(blocks.len(), 6);

    let x_origins: Vec<u32> = blocks.iter().filter(|b| b.y0 == 0).map(|b| b.x0).collect();
    let widths: Vec<u32> = blocks.iter().filter(|b| b.y0 == 0).map(|b| b.width).collect();
    assert_eq!(x_origins, vec![0, 16, 32]);
    assert_eq!(widths, vec![16, 16, 1]);

    let y_origins: Vec<u32> = blocks.iter().filter(|b| b.x0 == 0).map(|b| b.y0).collect();
    let heights: Vec<u32> = blocks.iter().filter(|b| b.x0 == 0).map(|b| b.height).collect();
    assert_eq!(y_origins, vec![0, 16]);
    assert_eq!(heights, vec![16, 4]);

    Ok(())
}

#[test]
fn test_block_grid_covers_every_pixel_once() -> anyhow::Result<()> {
    for &(width, height) in &[(1, 1), (15, 16), (16, 16), (17, 17), (33, 20), (64, 3), (100, 71)] {
        let blocks = block_grid(width, height, 16)?;
        let mut hits = vec![0u8; (width * height) as usize];
        for block in &blocks {
            for y in block.y0..block.y0 + block.height {
                for x in block.x0..block.x0 + block.width {
                    hits[(y * width + x) as usize] += 1;
                }
            }
        }
        assert!(
            hits.iter().all(|&n| n == 1),
            "{}x{} must be covered exactly once",
            width,
            height
        );
        let area: u64 = blocks.iter().map(Block::area).sum();
        assert_eq!(area, u64::from(width) * u64::from(height));
    }
    Ok(())
}

#[test]
fn test_block_grid_edge_cases() {
    assert!(block_grid(0, 10, 16).unwrap().is_empty());
    assert!(block_grid(10, 0, 16).unwrap().is_empty());
    assert!(matches!(
        block_grid(10, 10, 0),
        Err(StegoError::InvalidBlockSize)
    ));
}

#[test]
fn test_render_writes_every_pixel_at_its_coordinate() -> anyhow::Result<()> {
    let calls = AtomicUsize::new(0);
    let (image, report) = Scheduler::new(4).render(70, 45, |x, y| {
        calls.fetch_add(1, Ordering::Relaxed);
        Rgba([x as u8, y as u8, (x ^ y) as u8, 255])
    })?;

    assert_eq!(calls.load(Ordering::Relaxed), 70 * 45);
    assert_eq!(report.blocks, 5 * 3);
    assert_eq!(report.threads, 4);
    for (x, y, pixel) in image.enumerate_pixels() {
        assert_eq!(*pixel, Rgba([x as u8, y as u8, (x ^ y) as u8, 255]));
    }
    Ok(())
}

#[test]
fn test_runs_are_deterministic_across_thread_counts() -> anyhow::Result<()> {
    let carrier = random_image(90, 61);
    let hidden = random_image(90, 61);
    let depth = BitDepth::normalize(3);
    let job = Job::Embed {
        carrier: &carrier,
        hidden: &hidden,
    };

    let (single, _) = Scheduler::new(1).run(job, depth)?;
    let (many, _) = Scheduler::new(8).run(job, depth)?;
    let (odd_blocks, _) = Scheduler::new(3).with_block_size(7).run(job, depth)?;
    assert_eq!(single.as_raw(), many.as_raw());
    assert_eq!(single.as_raw(), odd_blocks.as_raw());

    let (revealed_a, _) = Scheduler::new(1).run(Job::Reveal { image: &single }, depth)?;
    let (revealed_b, _) = Scheduler::default().run(Job::Reveal { image: &single }, depth)?;
    assert_eq!(revealed_a.as_raw(), revealed_b.as_raw());
    assert!(revealed_a.pixels().all(|pixel| pixel[3] == 255));

    Ok(())
}

#[test]
fn test_dimension_mismatch() {
    let carrier = random_image(20, 20);
    let hidden = random_image(20, 19);
    let job = Job::Embed {
        carrier: &carrier,
        hidden: &hidden,
    };

    let result = Scheduler::default().run(job, BitDepth::normalize(1));
    assert!(matches!(
        result,
        Err(StegoError::DimensionMismatch {
            carrier_w: 20,
            carrier_h: 20,
            hidden_w: 20,
            hidden_h: 19,
        })
    ));
}

#[test]
fn test_panicking_block_fails_the_run() {
    let result = Scheduler::new(2).render(40, 40, |x, y| {
        if x == 20 && y == 20 {
            panic!("bad pixel");
        }
        Rgba([0, 0, 0, 255])
    });

    match result {
        Err(StegoError::BlockFailed { x0, y0, reason }) => {
            assert_eq!((x0, y0), (16, 16));
            assert_eq!(reason, "bad pixel");
        }
        other => panic!("expected a block failure, got {:?}", other.map(|(_, r)| r)),
    }
}

#[test]
fn test_empty_image() -> anyhow::Result<()> {
    let (image, report) = Scheduler::default().render(0, 0, |_, _| Rgba([1, 2, 3, 255]))?;
    assert_eq!(image.dimensions(), (0, 0));
    assert_eq!(report.blocks, 0);
    Ok(())
}

#[test]
fn test_scheduler_configuration() {
    let scheduler = Scheduler::default();
    assert_eq!(scheduler.threads(), 0);
    assert_eq!(scheduler.block_size(), BLOCK_SIZE);

    let scheduler = Scheduler::new(3).with_block_size(5);
    assert_eq!(scheduler.threads(), 3);
    assert_eq!(scheduler.block_size(), 5);
}
