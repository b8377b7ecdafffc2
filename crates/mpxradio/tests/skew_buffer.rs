//! RDS skew buffer capacity, overflow and underflow behaviour

use mpxradio::rds::{RdsSkewBuffer, SkewState};

const COMPOSITE_RATE: f64 = 128_000.0;

fn one_second_buffer() -> RdsSkewBuffer {
    RdsSkewBuffer::new(COMPOSITE_RATE, 1.0, 0.1).unwrap()
}

#[test]
fn test_capacity_for_one_second() {
    assert_eq!(one_second_buffer().capacity(), 1_187);
}

#[test]
fn test_overflow_counted_once() {
    let mut skew = one_second_buffer();
    skew.push_in(&vec![1; 1_187]);
    assert_eq!(skew.state(), SkewState::Overflow);
    assert_eq!(skew.stats().overruns, 1);
    assert!(!skew.stats().has_sync);

    // Further input is dropped without counting again
    skew.push_in(&vec![0; 500]);
    skew.push_in(&[0]);
    assert_eq!(skew.occupancy(), 1_187);
    assert_eq!(skew.stats().overruns, 1);
}

#[test]
fn test_overflow_ends_below_half_capacity() {
    let mut skew = one_second_buffer();
    skew.push_in(&vec![1; 1_187]);

    // Down to exactly half: still overflowing
    for _ in 0..(1_187 - 593) {
        assert_eq!(skew.pop_out(), 1);
    }
    assert_eq!(skew.occupancy(), 593);
    skew.push_in(&[0]);
    assert_eq!(skew.occupancy(), 593);
    assert_eq!(skew.state(), SkewState::Overflow);

    // One below half: input accepted again
    skew.pop_out();
    skew.push_in(&[0]);
    assert_eq!(skew.occupancy(), 593);
    assert_eq!(skew.state(), SkewState::Normal);
    assert!(skew.stats().has_sync);
    assert_eq!(skew.stats().overruns, 1);
}

#[test]
fn test_underrun_on_fresh_buffer() {
    let mut skew = one_second_buffer();
    assert_eq!(skew.pop_out(), 0);
    assert_eq!(skew.state(), SkewState::Underflow);
    assert_eq!(skew.stats().underruns, 1);
    assert!(!skew.stats().has_sync);

    // Half capacity is not enough to resume
    skew.push_in(&vec![1; 593]);
    assert_eq!(skew.pop_out(), 0);
    assert!(!skew.stats().has_sync);

    skew.push_in(&[1]);
    assert_eq!(skew.pop_out(), 1);
    assert_eq!(skew.state(), SkewState::Normal);
    assert!(skew.stats().has_sync);
    assert_eq!(skew.stats().underruns, 1);
}

#[test]
fn test_drain_enters_underflow() {
    let mut skew = one_second_buffer();
    skew.push_in(&vec![1; 600]);
    for _ in 0..600 {
        assert_eq!(skew.pop_out(), 1);
    }
    assert_eq!(skew.occupancy(), 0);
    assert_eq!(skew.pop_out(), 0);
    assert_eq!(skew.state(), SkewState::Underflow);
    // The initial wait ended before any pop found the buffer short
    assert_eq!(skew.stats().underruns, 1);
}

#[test]
fn test_encode_side_consumes_at_bit_rate() {
    let mut skew = one_second_buffer();
    skew.push_in(&vec![1; 1_000]);

    // Half a second of composite pulls about 594 bits
    let mut mpx = vec![0.0f32; (COMPOSITE_RATE / 2.0) as usize];
    skew.process(&[], &mut mpx, false);
    let consumed = 1_000 - skew.occupancy();
    assert!((consumed as i64 - 594).abs() < 10, "consumed {}", consumed);
    assert_eq!(skew.state(), SkewState::Normal);
}
