//! Adapters: concrete implementations of the dispatcher port traits.
//!
//! | Adapter    | Implements     | Connects to                       |
//! |------------|----------------|-----------------------------------|
//! | `log_sink` | EventSink      | `log` facade                      |
//! | `radio`    | TransportPort  | platform radio power/presence     |
//! | `sim_link` | LinkExecutor   | scripted in-process link (host)   |

pub mod log_sink;
pub mod radio;
pub mod sim_link;
