use templar::{
    cli::{get_args, get_log_level, run},
    error::default_error_handler,
};

fn main() {
    let args = get_args();
    env_logger::Builder::new().filter_level(get_log_level(&args)).init();

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}
