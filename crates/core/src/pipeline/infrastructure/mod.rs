pub mod channel_frame_sink;
