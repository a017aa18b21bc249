pub mod metrics_refresh;
