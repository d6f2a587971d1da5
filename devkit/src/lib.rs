/*!
# zbxrelay DevKit - Stubs et utilitaires de test

Bibliothèque facilitant les tests du relais sans vrai agent ni vrai collecteur :
- Collecteur TCP factice qui enregistre les paquets reçus
- Client agent factice (trames ZBXD, builders de requêtes)
- Fixtures fichiers (monitems.json, zbxrelay.yaml)
*/

pub mod agent_client;
pub mod collector_stub;
pub mod fixtures;
pub mod test_utils;

pub use agent_client::{AgentClient, RequestBuilder};
pub use collector_stub::{CollectorMode, MockCollector};
pub use fixtures::RelayFixture;
pub use test_utils::{init_test_logging, wait_until};
