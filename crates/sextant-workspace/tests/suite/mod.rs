// One module per engine surface; shared fixtures live in `util`.

mod engine_flow;
mod util;
mod watch_flow;
