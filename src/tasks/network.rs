use embassy_net::Runner;
use embassy_time::{Duration, Timer};
use esp_wifi::wifi::{ClientConfiguration, Configuration, WifiController, WifiDevice, WifiEvent};

use crate::config;

const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Keeps the station associated, reconnecting after every drop.
#[embassy_executor::task]
pub async fn connection_task(mut controller: WifiController<'static>) {
    info!("Wi-Fi connection task started");
    loop {
        if matches!(controller.is_connected(), Ok(true)) {
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("Wi-Fi disconnected");
            Timer::after(RECONNECT_DELAY).await;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let client = Configuration::Client(ClientConfiguration {
                ssid: config::WIFI_SSID.into(),
                password: config::WIFI_PASSWORD.into(),
                ..Default::default()
            });
            if let Err(e) = controller.set_configuration(&client) {
                error!("Wi-Fi configuration rejected: {:?}", e);
                Timer::after(RECONNECT_DELAY).await;
                continue;
            }
            if let Err(e) = controller.start_async().await {
                error!("Wi-Fi start failed: {:?}", e);
                Timer::after(RECONNECT_DELAY).await;
                continue;
            }
            info!("Wi-Fi started");
        }

        info!("Connecting to {}…", config::WIFI_SSID);
        match controller.connect_async().await {
            Ok(()) => info!("Wi-Fi connected"),
            Err(e) => {
                warn!("Wi-Fi connect failed: {:?}", e);
                Timer::after(RECONNECT_DELAY).await;
            }
        }
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
