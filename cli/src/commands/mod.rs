mod favorite;
mod helpers;
mod log;
mod profile;
mod search;
mod summary;

pub(crate) use favorite::{cmd_favorite_add, cmd_favorite_list, cmd_favorite_remove};
pub(crate) use log::{cmd_delete, cmd_log, cmd_undo};
pub(crate) use profile::{cmd_profile_set, cmd_profile_show};
pub(crate) use search::cmd_search;
pub(crate) use summary::{cmd_summary, cmd_week};
