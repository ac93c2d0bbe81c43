pub mod controls;
pub mod dial;
pub mod help_overlay;
pub mod readout;
pub mod vu_meter;
