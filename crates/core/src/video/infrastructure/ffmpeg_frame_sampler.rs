use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use image::codecs::jpeg::JpegEncoder;

use crate::shared::cancellation::RunControl;
use crate::shared::frame_set::frame_file_name;
use crate::video::domain::frame_sampler::FrameSampler;

/// ffmpeg's container duration unit (microseconds).
const AV_TIME_BASE: f64 = 1_000_000.0;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Samples frames with ffmpeg-next and writes them as JPEG files.
///
/// Frame `k` (1-based) is the picture on screen at `k / sampling_rate`
/// seconds, for every `k` up to `floor(duration * sampling_rate)`. If the
/// stream ends before the last slot, the final picture fills the remaining
/// slots, so numbering never has gaps.
pub struct FfmpegFrameSampler {
    jpeg_quality: u8,
}

impl FfmpegFrameSampler {
    pub fn new() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

impl Default for FfmpegFrameSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSampler for FfmpegFrameSampler {
    fn probe_duration(&mut self, video: &Path) -> Result<f64, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let ictx = ffmpeg_next::format::input(video)?;

        let container = ictx.duration();
        let secs = if container > 0 {
            container as f64 / AV_TIME_BASE
        } else {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or("No video stream found")?;
            stream.duration() as f64 * f64::from(stream.time_base())
        };

        if !secs.is_finite() || secs <= 0.0 {
            return Err(format!("Could not determine duration of {}", video.display()).into());
        }
        Ok(secs)
    }

    fn sample(
        &mut self,
        video: &Path,
        sampling_rate: f64,
        output_dir: &Path,
        control: &RunControl,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let duration = self.probe_duration(video)?;
        let last_sequence = (duration * sampling_rate).floor() as u32;

        let mut ictx = ffmpeg_next::format::input(video)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let time_base = f64::from(stream.time_base());
        // AV_NOPTS_VALUE is i64::MIN, so an unknown start clamps to zero.
        let start_pts = stream.start_time().max(0);

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let mut decoder = codec_ctx.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        let mut slots = SlotWriter {
            output_dir,
            sampling_rate,
            last_sequence,
            next_sequence: 1,
            time_base,
            start_pts,
            scaler,
            width,
            height,
            jpeg_quality: self.jpeg_quality,
            current: Video::empty(),
            previous: Video::empty(),
            has_previous: false,
        };

        for (stream, packet) in ictx.packets() {
            if control.checkpoint().is_err() {
                return Err("Frame sampling interrupted".into());
            }
            if stream.index() != stream_index {
                continue;
            }
            if let Err(e) = decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }
            slots.drain(&mut decoder)?;
            if slots.is_full() {
                break;
            }
        }

        if !slots.is_full() {
            let _ = decoder.send_eof();
            slots.drain(&mut decoder)?;
        }
        slots.finish()?;

        log::debug!(
            "Sampled {} frames from {} ({duration:.2}s at {sampling_rate} fps)",
            slots.next_sequence - 1,
            video.display()
        );
        Ok(())
    }
}

/// Assigns decoded pictures to sampling slots and writes each slot to disk.
struct SlotWriter<'a> {
    output_dir: &'a Path,
    sampling_rate: f64,
    last_sequence: u32,
    next_sequence: u32,
    time_base: f64,
    start_pts: i64,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    jpeg_quality: u8,
    current: Video,
    previous: Video,
    has_previous: bool,
}

impl SlotWriter<'_> {
    fn is_full(&self) -> bool {
        self.next_sequence > self.last_sequence
    }

    fn drain(
        &mut self,
        decoder: &mut ffmpeg_next::decoder::Video,
    ) -> Result<(), Box<dyn std::error::Error>> {
        while decoder.receive_frame(&mut self.current).is_ok() {
            let pts = self.current.timestamp().or(self.current.pts()).unwrap_or(0);
            let t = (pts - self.start_pts) as f64 * self.time_base;

            // Every slot before `t` shows the previous picture.
            while !self.is_full() && slot_time(self.next_sequence, self.sampling_rate) < t {
                let source = if self.has_previous {
                    &self.previous
                } else {
                    &self.current
                };
                let path = self.output_dir.join(frame_file_name(self.next_sequence));
                write_frame(
                    &mut self.scaler,
                    source,
                    self.width,
                    self.height,
                    self.jpeg_quality,
                    &path,
                )?;
                self.next_sequence += 1;
            }

            std::mem::swap(&mut self.current, &mut self.previous);
            self.has_previous = true;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.has_previous {
            return Ok(());
        }
        while !self.is_full() {
            let path = self.output_dir.join(frame_file_name(self.next_sequence));
            write_frame(
                &mut self.scaler,
                &self.previous,
                self.width,
                self.height,
                self.jpeg_quality,
                &path,
            )?;
            self.next_sequence += 1;
        }
        Ok(())
    }
}

/// Video instant represented by frame `sequence`.
fn slot_time(sequence: u32, sampling_rate: f64) -> f64 {
    sequence as f64 / sampling_rate
}

fn write_frame(
    scaler: &mut scaling::Context,
    decoded: &Video,
    width: u32,
    height: u32,
    quality: u8,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rgb_frame = Video::empty();
    scaler.run(decoded, &mut rgb_frame)?;

    let pixels = packed_rgb_pixels(&rgb_frame, width, height);
    let image = image::RgbImage::from_raw(width, height, pixels)
        .ok_or("Decoded frame does not match its dimensions")?;

    let mut writer = BufWriter::new(File::create(path)?);
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))?;
    writer.flush()?;
    Ok(())
}

/// Copies an RGB24 frame into a tightly packed buffer, dropping row padding.
fn packed_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::cancellation::CancellationToken;
    use crate::shared::frame_set::FrameSet;
    use std::path::PathBuf;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut to_yuv = scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .unwrap();

        let write_packets = |encoder: &mut ffmpeg_next::encoder::Video,
                                 octx: &mut ffmpeg_next::format::context::Output| {
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut rgb = Video::new(ffmpeg_next::format::Pixel::RGB24, width, height);
            let stride = rgb.stride(0);
            let value = ((i * 40) % 256) as u8;
            let data = rgb.data_mut(0);
            for row in 0..height as usize {
                data[row * stride..row * stride + width as usize * 3].fill(value);
            }
            let mut yuv = Video::empty();
            to_yuv.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            write_packets(&mut encoder, &mut octx);
        }
        encoder.send_eof().unwrap();
        write_packets(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }

    fn video_fixture(dir: &Path, num_frames: usize, fps: i32) -> PathBuf {
        let path = dir.join("clip.mp4");
        create_test_video(&path, num_frames, 160, 120, fps);
        path
    }

    #[test]
    fn test_probe_duration_of_three_second_clip() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_fixture(dir.path(), 30, 10);

        let duration = FfmpegFrameSampler::new().probe_duration(&video).unwrap();

        assert!((duration - 3.0).abs() < 0.25, "duration was {duration}");
    }

    #[test]
    fn test_probe_duration_missing_file_fails() {
        let result = FfmpegFrameSampler::new().probe_duration(Path::new("/nonexistent/clip.mp4"));
        assert!(result.is_err());
    }

    #[test]
    fn test_sample_writes_contiguous_numbered_jpegs() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_fixture(dir.path(), 30, 10);
        let out = dir.path().join("frames");
        std::fs::create_dir(&out).unwrap();
        let mut sampler = FfmpegFrameSampler::new();
        let duration = sampler.probe_duration(&video).unwrap();

        sampler
            .sample(&video, 2.0, &out, &RunControl::unbounded())
            .unwrap();

        let set = FrameSet::from_dir(&out).unwrap();
        assert_eq!(set.len(), (duration * 2.0).floor() as usize);
        assert!(set.len() >= 5);
        let first = image::open(set.frames()[0].path()).unwrap();
        assert_eq!((first.width(), first.height()), (160, 120));
    }

    #[test]
    fn test_sample_stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_fixture(dir.path(), 30, 10);
        let out = dir.path().join("frames");
        std::fs::create_dir(&out).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = FfmpegFrameSampler::new().sample(
            &video,
            2.0,
            &out,
            &RunControl::new(token, None),
        );

        assert!(result.is_err());
        assert!(FrameSet::from_dir(&out).unwrap().is_empty());
    }

    #[test]
    fn test_slot_time() {
        assert_eq!(slot_time(1, 2.0), 0.5);
        assert_eq!(slot_time(10, 2.0), 5.0);
    }

    #[test]
    fn test_jpeg_quality_is_clamped() {
        assert_eq!(FfmpegFrameSampler::new().with_jpeg_quality(0).jpeg_quality, 1);
        assert_eq!(
            FfmpegFrameSampler::new().with_jpeg_quality(250).jpeg_quality,
            100
        );
    }
}
