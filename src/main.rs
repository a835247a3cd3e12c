use gatekeeper_bot::config::{self, Settings};
use gatekeeper_bot::dispatcher::App;
use gatekeeper_bot::gateway::TelegramGateway;
use gatekeeper_bot::polling;
use gatekeeper_bot::store::Store;
use teloxide::Bot;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting bot...");

    let settings = Settings::from_env();
    let mut store = Store::open(&settings.data_dir);
    let token = match config::configure(&mut store, settings.token, config::prompt_line) {
        Ok(token) => token,
        Err(e) => {
            log::error!("Configuration failed: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(token);
    let app = App::new(TelegramGateway::new(bot), store);
    polling::run(app).await
}
