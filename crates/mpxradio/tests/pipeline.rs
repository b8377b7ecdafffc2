//! End-to-end pipeline runs over synthetic FM captures

mod helpers;

use crossbeam::channel::Receiver;
use helpers::{deinterleave, fm_modulate, rms, stereo_composite, to_cf32_bytes, tone};
use mpxdsp::dsp::{DspBlock, fir::RealFir, taps};
use mpxradio::{
    CaptureDevice, ChannelSink, IqFileDevice, IqFormat, IqInput, RadioPipeline, RadioSettings,
    SampleQueue, SinkStatus,
};

const CAPTURE_RATE: f64 = 384_000.0;
const DEVIATION: f64 = 85_000.0;

/// One second of FM-modulated stereo composite carrying a mono tone
fn mono_capture(amplitude: f32) -> Vec<num_complex::Complex<f32>> {
    let n = CAPTURE_RATE as usize;
    let lpr = tone(1_000.0, amplitude, CAPTURE_RATE, n);
    let lmr = vec![0.0; n];
    let mpx = stereo_composite(&lpr, &lmr, 0.09, CAPTURE_RATE);
    fm_modulate(&mpx, DEVIATION, CAPTURE_RATE)
}

fn collect(receiver: &Receiver<Vec<f32>>) -> Vec<f32> {
    receiver.try_iter().flatten().collect()
}

#[test]
fn test_decimation_arithmetic() {
    let taps = taps::low_pass(61_000.0, 1_500.0, CAPTURE_RATE).unwrap();
    for &block in &[1_000usize, 3_000, 4_097, 16_384] {
        let mut fir = RealFir::decimating(taps.clone(), 3);
        let out = fir.process(&vec![0.1f32; block]);
        assert!(
            (out.len() as i64 - (block / 3) as i64).abs() <= 1,
            "block {} gave {} outputs",
            block,
            out.len()
        );
    }
}

#[test]
fn test_mono_tone_end_to_end() {
    let settings = RadioSettings {
        deemphasis_us: 0.0,
        ..RadioSettings::default()
    };
    let queue = SampleQueue::new(2 * CAPTURE_RATE as usize);
    let (mpx_sink, mpx_rx) = ChannelSink::bounded(256);
    let (audio_sink, audio_rx) = ChannelSink::bounded(256);
    let mut pipeline = RadioPipeline::new(
        settings,
        queue.clone(),
        Some(Box::new(mpx_sink)),
        Some(Box::new(audio_sink)),
    )
    .unwrap();

    assert_eq!(queue.write(&mono_capture(0.3)), CAPTURE_RATE as usize);
    queue.close();
    while pipeline.work().unwrap() {}

    let mpx = collect(&mpx_rx);
    let audio = collect(&audio_rx);
    assert_eq!(mpx.len(), 128_000);
    assert_eq!(audio.len(), 2 * 64_000);

    let status = pipeline.status();
    assert_eq!(status.mpx_sink, Some(SinkStatus::Connected));
    assert_eq!(status.audio_sink, Some(SinkStatus::Connected));
    assert_eq!(status.captured_dropped_samples, 0);

    let (left, right) = deinterleave(&audio);
    let tail = left.len() / 2;
    let expected = 0.3 / 2f32.sqrt();
    assert!((rms(&left[tail..]) - expected).abs() < 0.1 * expected, "left {}", rms(&left[tail..]));
    assert!((rms(&right[tail..]) - expected).abs() < 0.1 * expected, "right {}", rms(&right[tail..]));
}

#[test]
fn test_rds_and_stereo_generator_from_file() {
    let path = std::env::temp_dir().join(format!("mpxradio-e2e-{}.cf32", std::process::id()));
    std::fs::write(&path, to_cf32_bytes(&mono_capture(0.2))).unwrap();

    let settings = RadioSettings {
        rds_enable: true,
        stereo_generator_enable: true,
        status_reporting_enable: true,
        ..RadioSettings::default()
    };
    let queue = SampleQueue::new(4 * settings.block_size);
    let (mpx_sink, mpx_rx) = ChannelSink::bounded(256);
    let mut pipeline =
        RadioPipeline::new(settings.clone(), queue.clone(), Some(Box::new(mpx_sink)), None)
            .unwrap();

    let mut device = IqFileDevice::new(
        IqInput::File(path.clone()),
        IqFormat::Cf32,
        settings.capture_rate,
        settings.block_size,
    );
    device.start(queue.clone()).unwrap();
    while pipeline.work().unwrap() {}
    device.join();

    let mpx = collect(&mpx_rx);
    assert_eq!(mpx.len(), 128_000);
    assert!(mpx.iter().all(|x| x.is_finite()));
    assert!(rms(&mpx[64_000..]) > 0.05);

    let status = pipeline.last_status().unwrap();
    assert_eq!(status.rds_overruns, 0);
    assert!(pipeline.rds_stats().is_some());
    assert_eq!(device.dropped_samples(), 0);

    std::fs::remove_file(path).ok();
}
