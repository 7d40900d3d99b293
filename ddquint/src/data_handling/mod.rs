pub mod ddplt_parser;
pub mod droplet_csv;
pub mod template_parser;
pub mod well_utils;
