use std::sync::Arc;

use super::brokerage::BrokerageService;
use super::flow::FlowOrchestrator;
use super::kyc::{KycService, WebhookSettings};
use super::payments::PaymentsService;
use super::users::UserService;
use crate::integrations::{BrokerageProvider, FxProvider, KycProvider};
use crate::store::EntityStore;

/// Every onboarding service wired against one store and one set of providers.
pub struct OnboardingServices {
    pub users: Arc<UserService>,
    pub kyc: Arc<KycService>,
    pub payments: Arc<PaymentsService>,
    pub brokerage: Arc<BrokerageService>,
    pub flow: FlowOrchestrator,
}

impl OnboardingServices {
    pub fn new(
        store: Arc<dyn EntityStore>,
        kyc_provider: Arc<dyn KycProvider>,
        fx_provider: Arc<dyn FxProvider>,
        brokerage_provider: Arc<dyn BrokerageProvider>,
        webhook: WebhookSettings,
    ) -> Self {
        let users = Arc::new(UserService::new(store.clone()));
        let kyc = Arc::new(KycService::new(store.clone(), kyc_provider, webhook));
        let payments = Arc::new(PaymentsService::new(store.clone(), fx_provider));
        let brokerage = Arc::new(BrokerageService::new(store, brokerage_provider));
        let flow = FlowOrchestrator::new(
            users.clone(),
            kyc.clone(),
            payments.clone(),
            brokerage.clone(),
        );

        Self {
            users,
            kyc,
            payments,
            brokerage,
            flow,
        }
    }
}
