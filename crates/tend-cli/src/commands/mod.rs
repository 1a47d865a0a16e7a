pub mod orphans;
pub mod promote;
pub mod watch;
