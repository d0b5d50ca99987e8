pub mod performance_monitor;
