pub use log::{debug, info, trace};
