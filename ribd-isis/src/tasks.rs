//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::Duration;

use ribd_utils::UnboundedSender;
use ribd_utils::task::{IntervalTask, Task, TimeoutTask};
use tokio::sync::oneshot;
use tracing::{Instrument, debug_span};

use crate::debug::Debug;
use crate::device::DeviceSys;
use crate::packet::{P2pHello, Pdu, SystemId};

//
// IS-IS tasks diagram:
//
//                          +--------------+
//       receiver (Nx) ->   |              |
//     hold_timer (Nx) ->   |   instance   | -> (Nx) hello_interval
//         handle (1x) ->   |              |
//                          +--------------+
//

// IS-IS inter-task message types.
pub mod messages {
    use ribd_utils::Responder;

    use crate::config::DeviceCfg;
    use crate::device::{DeviceStatus, DeviceSys, PhyDevice};
    use crate::error::Error;
    use crate::packet::{Pdu, Snpa, SystemId};

    use super::*;

    #[derive(Debug)]
    pub enum InstanceMsg {
        PduRx(PduRxMsg),
        HoldTimer(HoldTimerMsg),
        Control(ControlMsg),
    }

    #[derive(Debug)]
    pub struct PduRxMsg {
        pub device: String,
        pub generation: u64,
        pub src: Snpa,
        pub pdu: Pdu,
    }

    #[derive(Debug)]
    pub struct HoldTimerMsg {
        pub device: String,
        pub generation: u64,
        pub system_id: SystemId,
    }

    #[derive(Debug)]
    pub enum ControlMsg {
        AddDevice {
            config: DeviceCfg,
            sys: Arc<dyn DeviceSys>,
            responder: Option<Responder<Result<(), Error>>>,
        },
        RemoveDevice {
            name: String,
            responder: Responder<Result<(), Error>>,
        },
        DeviceUpdate {
            phy: PhyDevice,
            responder: Responder<Result<(), Error>>,
        },
        DeviceStatus {
            name: String,
            responder: Responder<Option<DeviceStatus>>,
        },
        Shutdown {
            responder: Responder<()>,
        },
    }
}

use messages::{HoldTimerMsg, InstanceMsg, PduRxMsg};

// ===== IS-IS tasks =====

// PDU Rx task.
//
// Runs until the device signals done or the packet socket fails.
pub(crate) fn receiver(
    device: &str,
    generation: u64,
    sys: Arc<dyn DeviceSys>,
    mut done_rx: oneshot::Receiver<()>,
    instance_msgp: &UnboundedSender<InstanceMsg>,
) -> Task<()> {
    let span1 = debug_span!("device", name = %device);
    let _span1_guard = span1.enter();
    let span2 = debug_span!("input");
    let _span2_guard = span2.enter();

    let device = device.to_owned();
    let instance_msgp = instance_msgp.clone();
    Task::spawn(
        async move {
            loop {
                let result = tokio::select! {
                    _ = &mut done_rx => return,
                    result = sys.recv() => result,
                };
                match result {
                    Ok((src, pdu)) => {
                        let msg = InstanceMsg::PduRx(PduRxMsg {
                            device: device.clone(),
                            generation,
                            src,
                            pdu,
                        });
                        if instance_msgp.send(msg).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        error.log();
                        return;
                    }
                }
            }
        }
        .in_current_span(),
    )
}

// Hello Tx interval task.
pub(crate) fn hello_interval(
    device: &str,
    sys: Arc<dyn DeviceSys>,
    hello: P2pHello,
    interval: u16,
) -> IntervalTask {
    let device = device.to_owned();
    let pdu = Pdu::P2pHello(hello);

    IntervalTask::new(
        Duration::from_secs(interval.into()),
        true,
        move || {
            let device = device.clone();
            let sys = sys.clone();
            let pdu = pdu.clone();

            async move {
                Debug::PduTx(&device, &pdu).log();
                if let Err(error) = sys.send(pdu).await {
                    error.log();
                }
            }
        },
    )
}

// Adjacency hold timer.
pub(crate) fn hold_timer(
    device: &str,
    generation: u64,
    system_id: SystemId,
    holdtime: u16,
    instance_msgp: &UnboundedSender<InstanceMsg>,
) -> TimeoutTask {
    let device = device.to_owned();
    let instance_msgp = instance_msgp.clone();

    TimeoutTask::new(
        Duration::from_secs(holdtime.into()),
        move || async move {
            let msg = InstanceMsg::HoldTimer(HoldTimerMsg {
                device,
                generation,
                system_id,
            });
            let _ = instance_msgp.send(msg);
        },
    )
}
