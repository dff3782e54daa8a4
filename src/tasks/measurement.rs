use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Timer};

use crate::config::RECORD_QUEUE_DEPTH;
use crate::scheduler::{Clock, Schedule, Scheduler, SystemClock};
use crate::tasks::AirStation;
use crate::telemetry::Record;

#[embassy_executor::task]
pub async fn measurement_task(
    mut station: AirStation,
    stack: Stack<'static>,
    mut records: Sender<'static, CriticalSectionRawMutex, Record, RECORD_QUEUE_DEPTH>,
) {
    let mut scheduler = Scheduler::new(&Schedule::default(), SystemClock.now());
    info!("Starting measurement cycles…");

    loop {
        match scheduler.next_deadline() {
            Some(deadline) => Timer::at(deadline).await,
            None => {
                warn!("no job armed");
                Timer::after(Duration::from_secs(1)).await;
            }
        }

        // Sensor polls block this executor for their bus time, bounded by the
        // gas sensor's poll budget.
        let ran = scheduler.run_due(SystemClock, &mut station, &mut records, stack.is_config_up());
        trace!("{} jobs ran", ran);
    }
}
