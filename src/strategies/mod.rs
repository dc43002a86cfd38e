pub mod pattern_engine;
pub mod qualifier;
pub mod signals;
