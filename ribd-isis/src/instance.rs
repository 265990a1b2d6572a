//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use ribd_rib::{SourceId, SourceIdAllocator};
use ribd_utils::task::Task;
use ribd_utils::{Responder, UnboundedReceiver, UnboundedSender};
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug_span};

use crate::config::{DeviceCfg, InstanceCfg};
use crate::debug::Debug;
use crate::device::{Device, DeviceStatus, DeviceSys, PhyDevice};
use crate::error::Error;
use crate::packet::SystemId;
use crate::rib::IsisRib;
use crate::tasks::messages::{ControlMsg, HoldTimerMsg, InstanceMsg, PduRxMsg};

// IS-IS instance.
//
// Owns every device and adjacency, and processes all PDUs, timer expiries and
// control requests from a single task.
#[derive(Debug)]
pub struct Instance {
    system_id: SystemId,
    devices: BTreeMap<String, Device>,
    rib: Arc<IsisRib>,
    sources: SourceIdAllocator,
    instance_msgp: UnboundedSender<InstanceMsg>,
}

// Instance state shared by all devices.
#[derive(Debug)]
pub struct InstanceView<'a> {
    pub system_id: SystemId,
    pub rib: &'a Arc<IsisRib>,
    pub instance_msgp: &'a UnboundedSender<InstanceMsg>,
    sources: &'a mut SourceIdAllocator,
}

// Handle to a running instance.
#[derive(Debug)]
pub struct InstanceHandle {
    rib: Arc<IsisRib>,
    instance_msgp: UnboundedSender<InstanceMsg>,
    task: Task<()>,
}

// ===== impl Instance =====

impl Instance {
    fn new(
        system_id: SystemId,
        rib: Arc<IsisRib>,
        instance_msgp: UnboundedSender<InstanceMsg>,
    ) -> Instance {
        Instance {
            system_id,
            devices: Default::default(),
            rib,
            sources: Default::default(),
            instance_msgp,
        }
    }

    async fn run(mut self, mut instance_msgc: UnboundedReceiver<InstanceMsg>) {
        Debug::InstanceStart(&self.system_id).log();

        while let Some(msg) = instance_msgc.recv().await {
            match msg {
                InstanceMsg::PduRx(msg) => self.process_pdu(msg),
                InstanceMsg::HoldTimer(msg) => self.process_holdtimer(msg),
                InstanceMsg::Control(msg) => {
                    if let ControlFlow::Break(responder) =
                        self.process_control(msg).await
                    {
                        self.stop().await;
                        let _ = responder.send(());
                        return;
                    }
                }
            }
        }
    }

    fn process_pdu(&mut self, msg: PduRxMsg) {
        let (devices, mut view) = self.split();
        if let Some(device) = devices.get_mut(&msg.device) {
            device.pdu_rx(&mut view, msg.generation, msg.src, msg.pdu);
        }
    }

    fn process_holdtimer(&mut self, msg: HoldTimerMsg) {
        let (devices, mut view) = self.split();
        if let Some(device) = devices.get_mut(&msg.device) {
            device.holdtimer_expiry(&mut view, msg.generation, msg.system_id);
        }
    }

    async fn process_control(
        &mut self,
        msg: ControlMsg,
    ) -> ControlFlow<Responder<()>> {
        match msg {
            ControlMsg::AddDevice {
                config,
                sys,
                responder,
            } => {
                let result = self.device_add(config, sys);
                match responder {
                    Some(responder) => {
                        let _ = responder.send(result);
                    }
                    None => {
                        if let Err(error) = result {
                            error.log();
                        }
                    }
                }
            }
            ControlMsg::RemoveDevice { name, responder } => {
                let result = self.device_remove(&name).await;
                let _ = responder.send(result);
            }
            ControlMsg::DeviceUpdate { phy, responder } => {
                let result = self.device_update(phy).await;
                let _ = responder.send(result);
            }
            ControlMsg::DeviceStatus { name, responder } => {
                let status = self.devices.get(&name).map(Device::status);
                let _ = responder.send(status);
            }
            ControlMsg::Shutdown { responder } => {
                return ControlFlow::Break(responder);
            }
        }

        ControlFlow::Continue(())
    }

    fn device_add(
        &mut self,
        config: DeviceCfg,
        sys: Arc<dyn DeviceSys>,
    ) -> Result<(), Error> {
        if self.devices.contains_key(&config.name) {
            return Err(Error::DeviceExists(config.name));
        }

        let device = Device::new(config, sys);
        self.devices.insert(device.name.clone(), device);
        Ok(())
    }

    async fn device_remove(&mut self, name: &str) -> Result<(), Error> {
        let mut device = self
            .devices
            .remove(name)
            .ok_or_else(|| Error::DeviceNotFound(name.to_owned()))?;

        let (_, mut view) = self.split();
        if let Err(error) = device.disable(&mut view).await {
            error.log();
        }
        Debug::DeviceDelete(name).log();
        Ok(())
    }

    async fn device_update(&mut self, phy: PhyDevice) -> Result<(), Error> {
        let (devices, mut view) = self.split();
        let device = devices
            .get_mut(&phy.name)
            .ok_or_else(|| Error::DeviceNotFound(phy.name.clone()))?;
        device.device_update(&mut view, phy).await
    }

    // Stops all devices, withdrawing every route learned by the instance.
    async fn stop(&mut self) {
        let (devices, mut view) = self.split();
        for device in devices.values_mut() {
            if let Err(error) = device.disable(&mut view).await {
                error.log();
            }
        }
        Debug::InstanceStop.log();
    }

    fn split(&mut self) -> (&mut BTreeMap<String, Device>, InstanceView<'_>) {
        let view = InstanceView {
            system_id: self.system_id,
            rib: &self.rib,
            instance_msgp: &self.instance_msgp,
            sources: &mut self.sources,
        };
        (&mut self.devices, view)
    }
}

// ===== impl InstanceView =====

impl InstanceView<'_> {
    // Allocates the source identifier of a new adjacency.
    pub(crate) fn next_source(&mut self) -> SourceId {
        self.sources.allocate()
    }

    // Makes the identifier of a withdrawn adjacency available again.
    pub(crate) fn release_source(&mut self, source: SourceId) {
        self.sources.release(source);
    }
}

// ===== impl InstanceHandle =====

impl InstanceHandle {
    // Starts an instance without devices.
    pub fn spawn(system_id: SystemId) -> InstanceHandle {
        let rib = Arc::new(IsisRib::default());
        let (instance_msgp, instance_msgc) = mpsc::unbounded_channel();
        let instance =
            Instance::new(system_id, rib.clone(), instance_msgp.clone());
        let span = debug_span!("isis", %system_id);
        let task = Task::spawn(instance.run(instance_msgc).instrument(span));

        InstanceHandle {
            rib,
            instance_msgp,
            task,
        }
    }

    // Starts an instance with every configured device.
    //
    // Devices stay down until their physical state is reported.
    pub fn from_config<F>(config: &InstanceCfg, sys: F) -> InstanceHandle
    where
        F: Fn(&DeviceCfg) -> Arc<dyn DeviceSys>,
    {
        let handle = InstanceHandle::spawn(config.system_id);
        for device in &config.devices {
            let msg = ControlMsg::AddDevice {
                config: device.clone(),
                sys: sys(device),
                responder: None,
            };
            let _ = handle.instance_msgp.send(InstanceMsg::Control(msg));
        }
        handle
    }

    pub fn rib(&self) -> &Arc<IsisRib> {
        &self.rib
    }

    pub async fn add_device(
        &self,
        config: DeviceCfg,
        sys: Arc<dyn DeviceSys>,
    ) -> Result<(), Error> {
        self.request(|responder| ControlMsg::AddDevice {
            config,
            sys,
            responder: Some(responder),
        })
        .await?
    }

    // Deletes a device, tearing down its adjacency first.
    pub async fn remove_device(&self, name: &str) -> Result<(), Error> {
        let name = name.to_owned();
        self.request(|responder| ControlMsg::RemoveDevice { name, responder })
            .await?
    }

    // Reports the physical state of a device.
    pub async fn device_update(&self, phy: PhyDevice) -> Result<(), Error> {
        self.request(|responder| ControlMsg::DeviceUpdate { phy, responder })
            .await?
    }

    pub async fn device_status(&self, name: &str) -> Option<DeviceStatus> {
        let name = name.to_owned();
        self.request(|responder| ControlMsg::DeviceStatus { name, responder })
            .await
            .ok()
            .flatten()
    }

    // Stops the instance and waits for its task to finish.
    pub async fn shutdown(self) {
        let _ = self
            .request(|responder| ControlMsg::Shutdown { responder })
            .await;
        let _ = self.task.await;
    }

    async fn request<T>(
        &self,
        msg: impl FnOnce(Responder<T>) -> ControlMsg,
    ) -> Result<T, Error> {
        let (responder_tx, responder_rx) = oneshot::channel();
        self.instance_msgp
            .send(InstanceMsg::Control(msg(responder_tx)))
            .map_err(|_| Error::InstanceStopped)?;
        responder_rx.await.map_err(|_| Error::InstanceStopped)
    }
}
