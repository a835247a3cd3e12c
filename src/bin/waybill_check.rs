//! Checks a waybill on the FSRAR portal. The captcha has to be solved by hand.

use gatekeeper_bot::captcha::{self, WaybillQuery};
use gatekeeper_bot::config::prompt_line;
use reqwest::Url;

const CAPTCHA_IMAGE_FILE: &str = "captcha.png";

async fn check(query: WaybillQuery) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let base = Url::parse(captcha::BASE_URL)?;
    let client = captcha::client()?;
    let challenge = captcha::fetch_challenge(&client, &base).await?;

    match captcha::fetch_image(&client, &challenge).await {
        Ok(image) => {
            std::fs::write(CAPTCHA_IMAGE_FILE, image)?;
            println!("Капча сохранена в {CAPTCHA_IMAGE_FILE}");
        }
        Err(e) => log::warn!("Couldn't download captcha image: {e}"),
    }
    println!("Откройте изображение капчи по ссылке: {}", challenge.image_url);

    let answer = prompt_line("Введите капчу: ")?;
    log::info!("Captcha answer entered");

    Ok(captcha::submit(&client, &base, &challenge, &query, &answer).await?)
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting waybill check");

    let query = match (
        prompt_line("Введите номер ТТН: "),
        prompt_line("Введите ФСРАР ID получателя: "),
    ) {
        (Ok(ttn), Ok(receiver)) if !ttn.is_empty() && !receiver.is_empty() => {
            WaybillQuery { ttn, receiver }
        }
        (Err(e), _) | (_, Err(e)) => {
            log::error!("Couldn't read input: {e}");
            std::process::exit(1);
        }
        _ => {
            eprintln!("Введите номер ТТН и ФСРАР ID");
            std::process::exit(1);
        }
    };

    match check(query).await {
        Ok(data) => {
            log::info!("Response: {data}");
            println!("Ответ от сервера:");
            match serde_json::to_string_pretty(&data) {
                Ok(pretty) => println!("{pretty}"),
                Err(_) => println!("{data}"),
            }
        }
        Err(e) => {
            log::error!("Waybill check failed: {e}");
            eprintln!("Ошибка: {e}");
            std::process::exit(1);
        }
    }
}
