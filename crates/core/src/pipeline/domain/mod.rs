pub mod frame_sink;
