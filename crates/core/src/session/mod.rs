pub mod face_swap_session;
