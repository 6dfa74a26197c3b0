use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use shock_protocol::{AclRecord, AclType, Attributes, FileInformation, NodeId, NodeRecord};

use crate::client::ShockClient;
use crate::error::Error;
use crate::file::FileReader;

/// A node as fetched from the server, bound to the client that fetched it.
///
/// The record is a snapshot and is not refreshed. Once [`ShockNode::delete`]
/// succeeds, every accessor and proxy fails with [`Error::NodeDeleted`].
#[derive(Debug)]
pub struct ShockNode {
    record: NodeRecord,
    client: ShockClient,
    deleted: AtomicBool,
}

impl ShockNode {
    pub(crate) fn new(record: NodeRecord, client: ShockClient) -> Self {
        Self {
            record,
            client,
            deleted: AtomicBool::new(false),
        }
    }

    fn check_deleted(&self) -> Result<(), Error> {
        if self.deleted.load(Ordering::Acquire) {
            return Err(Error::NodeDeleted);
        }
        Ok(())
    }

    fn live(&self) -> Result<&NodeRecord, Error> {
        self.check_deleted()?;
        Ok(&self.record)
    }

    pub fn id(&self) -> Result<&NodeId, Error> {
        Ok(&self.live()?.id)
    }

    pub fn attributes(&self) -> Result<Option<&Attributes>, Error> {
        Ok(self.live()?.attributes.as_ref())
    }

    pub fn file_information(&self) -> Result<&FileInformation, Error> {
        Ok(&self.live()?.file)
    }

    /// Declared file format; an empty format reads as `None`.
    pub fn format(&self) -> Result<Option<&str>, Error> {
        Ok(self.live()?.file_format())
    }

    pub fn version(&self) -> Result<Option<&str>, Error> {
        Ok(self.live()?.version.as_deref())
    }

    pub fn record(&self) -> Result<&NodeRecord, Error> {
        self.live()
    }

    pub fn client(&self) -> &ShockClient {
        &self.client
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Deletes the node on the server and retires this handle.
    pub fn delete(&self) -> Result<(), Error> {
        self.client.delete_node(self.id()?)?;
        self.deleted.store(true, Ordering::Release);
        Ok(())
    }

    pub fn get_acls(&self) -> Result<AclRecord, Error> {
        self.client.get_acls(self.id()?)
    }

    pub fn get_acls_of_type(&self, acl: AclType) -> Result<AclRecord, Error> {
        self.client.get_acls_of_type(self.id()?, acl)
    }

    pub fn add_to_node_acl<S: AsRef<str>>(
        &self,
        users: &[S],
        acl: AclType,
    ) -> Result<AclRecord, Error> {
        self.client.add_to_node_acl(self.id()?, users, acl)
    }

    pub fn remove_from_node_acl<S: AsRef<str>>(
        &self,
        users: &[S],
        acl: AclType,
    ) -> Result<AclRecord, Error> {
        self.client.remove_from_node_acl(self.id()?, users, acl)
    }

    pub fn set_publicly_readable(&self, public: bool) -> Result<AclRecord, Error> {
        self.client.set_publicly_readable(self.id()?, public)
    }

    pub fn get_file(&self) -> Result<FileReader, Error> {
        self.client.get_file(self)
    }

    pub fn write_file<W: Write>(&self, sink: &mut W) -> Result<u64, Error> {
        self.client.write_file(self, sink)
    }
}
