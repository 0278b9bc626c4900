pub mod auth;
pub mod campaigns;
pub mod monitors;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    auth::configure(cfg);
    campaigns::configure(cfg);
    monitors::configure(cfg);
}
