pub mod ffmpeg_frame_sampler;
