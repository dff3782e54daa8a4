/// Something the scheduler can blink to show it is alive.
pub trait StatusIndicator {
    fn toggle(&mut self);

    /// Shows the fault state the firmware halts in.
    fn fault(&mut self);
}

/// Boards without a status LED.
impl StatusIndicator for () {
    fn toggle(&mut self) {}

    fn fault(&mut self) {}
}

impl<T: StatusIndicator + ?Sized> StatusIndicator for &mut T {
    fn toggle(&mut self) {
        (**self).toggle();
    }

    fn fault(&mut self) {
        (**self).fault();
    }
}

#[cfg(feature = "esp32c6")]
pub use ws2812::Led;

#[cfg(feature = "esp32c6")]
mod ws2812 {
    use esp_hal::gpio::OutputPin;
    use esp_hal::rmt::{TxChannel, TxChannelCreator};
    use esp_hal_smartled::{smart_led_buffer, SmartLedsAdapter};
    use smart_leds::hsv::{hsv2rgb, Hsv};
    use smart_leds::{SmartLedsWrite, RGB8};

    use super::StatusIndicator;

    const ON_BRIGHTNESS: u8 = 20;
    const HUE_STEP: u8 = 15;
    const FAULT: RGB8 = RGB8::new(ON_BRIGHTNESS, 0, 0);

    /// On-board WS2812 driven through an RMT channel.
    pub struct Led<TX>
    where
        TX: TxChannel,
    {
        ws2812: SmartLedsAdapter<TX, 25>,
        hue: u8,
        lit: bool,
    }

    impl<TX> Led<TX>
    where
        TX: TxChannel,
    {
        pub fn new_ws2812<C, O>(channel: C, pin: O) -> Self
        where
            C: TxChannelCreator<'static, TX>,
            O: OutputPin + 'static,
        {
            Self {
                ws2812: SmartLedsAdapter::new(channel, pin, smart_led_buffer!(1)),
                hue: 0,
                lit: false,
            }
        }

        /// Lights the LED at `brightness`, stepping the hue on every call.
        /// 0 turns it off.
        pub fn set_color(&mut self, brightness: u8) {
            let rgb = if brightness > 0 {
                let rgb = hsv2rgb(Hsv { hue: self.hue, sat: 255, val: brightness });
                self.hue = self.hue.wrapping_add(HUE_STEP);
                rgb
            } else {
                RGB8::new(0, 0, 0)
            };
            self.show(rgb);
        }

        fn show(&mut self, rgb: RGB8) {
            if self.ws2812.write([rgb].iter().cloned()).is_err() {
                warn!("led: ws2812 write failed");
            }
        }
    }

    impl<TX> StatusIndicator for Led<TX>
    where
        TX: TxChannel,
    {
        fn toggle(&mut self) {
            self.lit = !self.lit;
            self.set_color(if self.lit { ON_BRIGHTNESS } else { 0 });
        }

        fn fault(&mut self) {
            self.lit = true;
            self.show(FAULT);
        }
    }
}
